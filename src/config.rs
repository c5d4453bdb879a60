use std::collections::HashSet;
use std::env;
use std::sync::LazyLock;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::QuerySpec;

static QUERY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("query name pattern is valid"));

const DISCORD_WEBHOOK_PREFIX: &str = "https://discord.com/api/webhooks/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub queries: Vec<QueryConfig>,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub fetcher: FetcherConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueryConfig {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(url)]
    pub endpoint: String,
}

impl From<&QueryConfig> for QuerySpec {
    fn from(query: &QueryConfig) -> Self {
        QuerySpec::new(query.name.clone(), query.endpoint.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub fetch_timeout_secs: Option<u64>,
    pub report_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for the file backend, database URL for sqlite.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub request_timeout: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub fresh_window_secs: u64,
    pub per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub console: bool,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Loads defaults, then `config/default`, `config/{RUN_MODE}`, `config/local`,
    /// the optional explicit file, and finally `VINTED_WATCHER__*` variables.
    pub fn load(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::with_name(path));
        }

        let s = builder
            .add_source(Environment::with_prefix("VINTED_WATCHER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("queries", Vec::<String>::new())?
            .set_default("scheduler.interval_secs", 10)?
            .set_default("scheduler.report_timeout_secs", 30)?
            .set_default("storage.backend", "file")?
            .set_default("storage.path", "./data")?
            .set_default(
                "fetcher.user_agent",
                "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
            )?
            .set_default("fetcher.request_timeout", 30)?
            .set_default("fetcher.retry_attempts", 3)?
            .set_default("fetcher.retry_delay_ms", 2000)?
            .set_default("fetcher.fresh_window_secs", 180)?
            .set_default("fetcher.per_page", 20)?
            .set_default("notifications.console", true)?
            .set_default("notifications.discord.username", "Vinted Watcher")?
            .set_default("logging.level", "vinted_watcher=info")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9001)
    }

    pub fn query_specs(&self) -> Vec<QuerySpec> {
        self.queries.iter().map(QuerySpec::from).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate queries
        if self.queries.is_empty() {
            return Err(ConfigError::Message("At least one query must be configured".into()));
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            query.validate().map_err(|e| {
                ConfigError::Message(format!("Invalid query '{}': {}", query.name, e))
            })?;

            if !QUERY_NAME.is_match(&query.name) {
                return Err(ConfigError::Message(format!(
                    "Query name '{}' may only contain letters, digits, '-' and '_'",
                    query.name
                )));
            }

            if !query.endpoint.starts_with("http://") && !query.endpoint.starts_with("https://") {
                return Err(ConfigError::Message(format!(
                    "Query '{}' endpoint must be an http(s) URL",
                    query.name
                )));
            }

            // Names become file names, which may be case-insensitive.
            if !seen.insert(query.name.to_lowercase()) {
                return Err(ConfigError::Message(format!("Duplicate query name '{}'", query.name)));
            }
        }

        // Validate scheduler configuration
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        if self.scheduler.report_timeout_secs == 0 {
            return Err(ConfigError::Message("Scheduler report_timeout_secs must be greater than 0".into()));
        }

        if self.scheduler.fetch_timeout_secs == Some(0) {
            return Err(ConfigError::Message("Scheduler fetch_timeout_secs must be greater than 0".into()));
        }

        // Validate storage configuration
        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Message("Storage path must not be empty".into()));
        }

        // Validate fetcher configuration
        if self.fetcher.per_page == 0 || self.fetcher.per_page > 96 {
            return Err(ConfigError::Message("Fetcher per_page must be between 1 and 96".into()));
        }

        if self.fetcher.retry_attempts == 0 {
            return Err(ConfigError::Message("Fetcher retry_attempts must be greater than 0".into()));
        }

        // Validate notifications
        if let Some(webhook_url) = &self.notifications.discord.webhook_url {
            if !webhook_url.starts_with(DISCORD_WEBHOOK_PREFIX) {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        // Validate metrics configuration
        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
