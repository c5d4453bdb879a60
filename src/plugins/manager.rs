use async_trait::async_trait;

use super::reporters::{ConsoleReporter, DiscordReporter, DiscordWebhook};
use super::traits::Reporter;
use crate::config::NotificationsConfig;
use crate::models::CycleReport;
use crate::utils::error::ReportError;

pub type ReporterBox = Box<dyn Reporter>;

/// Fans every cycle report out to all registered reporters.
///
/// One reporter failing does not keep the others from running; the last
/// error is returned once all of them have been tried.
#[derive(Default)]
pub struct ReporterSet {
    reporters: Vec<ReporterBox>,
}

impl ReporterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the reporters enabled in the notifications configuration.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut set = Self::new();

        if config.console {
            set.register(Box::new(ConsoleReporter::new()));
        }
        if let Some(webhook) = DiscordWebhook::from_config(&config.discord) {
            set.register(Box::new(DiscordReporter::new(webhook)));
        }

        set
    }

    pub fn register(&mut self, reporter: ReporterBox) {
        tracing::debug!(reporter = reporter.name(), "Registered reporter");
        self.reporters.push(reporter);
    }

    pub fn reporter_types(&self) -> Vec<String> {
        self.reporters.iter().map(|r| r.plugin_type().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl Reporter for ReporterSet {
    fn name(&self) -> &str {
        "Reporter Set"
    }

    fn plugin_type(&self) -> &str {
        "set"
    }

    async fn report(&self, report: &CycleReport) -> Result<(), ReportError> {
        let mut last_error = None;

        for reporter in &self.reporters {
            if let Err(e) = reporter.report(report).await {
                tracing::warn!(reporter = reporter.name(), error = %e, "Reporter failed");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
