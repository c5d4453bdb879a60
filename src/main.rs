use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use vinted_watcher::config::{LoggingConfig, MetricsConfig};
use vinted_watcher::core::QueryRunner;
use vinted_watcher::plugins::ReporterSet;
use vinted_watcher::plugins::fetchers::VintedFetcher;
use vinted_watcher::{AppConfig, PollCoordinator, store};

#[derive(Parser, Debug)]
#[command(name = "vinted-watcher", version, about = "Watches Vinted catalog searches for new listings")]
struct Cli {
    /// Extra configuration file layered over config/default
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Log filter, e.g. `vinted_watcher=debug`
    #[arg(long)]
    log_level: Option<String>,
}

/// `--log-level` wins over `RUST_LOG`, which wins over the configured level.
fn log_directive(configured: &str, cli: Option<&str>, env: Option<String>) -> String {
    cli.map(str::to_string)
        .or(env)
        .unwrap_or_else(|| configured.to_string())
}

fn init_tracing(config: &LoggingConfig, override_level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let directive = log_directive(
        &config.level,
        override_level,
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "vinted-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to start metrics exporter")?;

    info!(%addr, "Metrics exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _guard = init_tracing(&config.logging, cli.log_level.as_deref())?;

    info!(queries = config.queries.len(), "Starting Vinted Watcher...");

    init_metrics(&config.metrics)?;

    let store = store::build(&config.storage)
        .await
        .context("failed to open snapshot store")?;
    let names: Vec<String> = config.queries.iter().map(|q| q.name.clone()).collect();
    store
        .initialize(&names)
        .await
        .context("failed to initialize snapshot slots")?;
    info!(backend = store.backend(), "Snapshot store ready");

    let fetcher = Arc::new(VintedFetcher::new(config.fetcher.clone()).context("failed to build HTTP client")?);
    let runner = Arc::new(
        QueryRunner::new(store, fetcher).with_fetch_timeout(config.scheduler.fetch_timeout()),
    );

    let reporters = ReporterSet::from_config(&config.notifications);
    if reporters.is_empty() {
        warn!("No reporters enabled; new listings will only be logged");
    }

    let coordinator = PollCoordinator::new(config.query_specs(), runner, Arc::new(reporters))
        .with_config(&config.scheduler);

    if cli.once {
        let report = coordinator.run_once().await;
        if report.failure_count() > 0 {
            anyhow::bail!(
                "{} of {} queries failed",
                report.failure_count(),
                report.results.len()
            );
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    coordinator.run(shutdown_rx).await;
    info!("Vinted Watcher stopped");

    Ok(())
}
