use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::core::QueryRunner;
use crate::models::{CycleReport, QueryResult, QuerySpec};
use crate::plugins::traits::Reporter;
use crate::utils::error::{QueryError, QueryFailure};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoordinatorState {
    /// A cycle is fanning out over the queries or being reported.
    Polling,
    /// Waiting for the interval to elapse.
    Idle,
    /// Shut down; no further cycles will run.
    Stopped,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub cycles_completed: u64,
    pub query_successes: u64,
    pub query_failures: u64,
    pub new_listings_reported: u64,
    pub last_cycle_started: Option<DateTime<Utc>>,
    pub last_cycle_finished: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

/// Polls every configured query on a fixed interval and hands each cycle's
/// aggregated results to the reporter.
///
/// The first cycle starts immediately. Queries within a cycle run as separate
/// tasks and the coordinator waits for all of them, so a query's next `load`
/// never overlaps its previous `save`.
pub struct PollCoordinator {
    queries: Vec<QuerySpec>,
    runner: Arc<QueryRunner>,
    reporter: Arc<dyn Reporter>,
    interval: Duration,
    report_timeout: Duration,
    state: watch::Sender<CoordinatorState>,
    stats: Arc<RwLock<CoordinatorStats>>,
    start_time: DateTime<Utc>,
}

impl PollCoordinator {
    pub fn new(queries: Vec<QuerySpec>, runner: Arc<QueryRunner>, reporter: Arc<dyn Reporter>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Polling);

        Self {
            queries,
            runner,
            reporter,
            interval: DEFAULT_INTERVAL,
            report_timeout: DEFAULT_REPORT_TIMEOUT,
            state,
            stats: Arc::new(RwLock::new(CoordinatorStats::default())),
            start_time: Utc::now(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = timeout;
        self
    }

    pub fn with_config(self, config: &SchedulerConfig) -> Self {
        self.with_interval(config.interval())
            .with_report_timeout(config.report_timeout())
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Follows state transitions, e.g. to wait for a cycle to finish.
    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub async fn stats(&self) -> CoordinatorStats {
        let mut stats = self.stats.read().await.clone();
        let uptime = Utc::now().signed_duration_since(self.start_time);
        stats.uptime_seconds = uptime.num_seconds().max(0) as u64;
        stats
    }

    /// Runs cycles until `shutdown` turns true.
    ///
    /// A shutdown requested while idle takes effect immediately. One requested
    /// mid-cycle lets the cycle finish and be reported first, so no query is
    /// interrupted between its fetch and its save.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            queries = self.queries.len(),
            interval_secs = self.interval.as_secs_f64(),
            "Poll coordinator started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            self.run_once().await;

            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        self.state.send_replace(CoordinatorState::Stopped);
        tracing::info!("Poll coordinator stopped");
    }

    /// One full Polling phase: fan out, wait for every query, report, record.
    /// Leaves the coordinator Idle.
    pub async fn run_once(&self) -> CycleReport {
        self.state.send_replace(CoordinatorState::Polling);

        let report = self.run_cycle().await;
        self.deliver(&report).await;
        self.record(&report).await;

        self.state.send_replace(CoordinatorState::Idle);
        report
    }

    async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!("cycle", %cycle_id);

        let handles: Vec<_> = self
            .queries
            .iter()
            .map(|spec| {
                let runner = Arc::clone(&self.runner);
                let spec = spec.clone();
                let name = spec.name.clone();
                let task_span = tracing::info_span!(parent: &span, "query", query = %name);
                let handle = tokio::spawn(async move { runner.run(&spec).await }.instrument(task_span));
                (name, handle)
            })
            .collect();

        let results: BTreeMap<String, QueryResult> = join_all(handles.into_iter().map(|(name, handle)| async move {
            let result = handle.await.unwrap_or_else(|e| {
                tracing::error!(query = %name, error = %e, "Query task did not complete");
                Err(QueryFailure::new(QueryError::Aborted(e.to_string())))
            });
            (name, result)
        }))
        .await
        .into_iter()
        .collect();

        let report = CycleReport::new(cycle_id, started_at, results);

        span.in_scope(|| {
            tracing::info!(
                queries = report.results.len(),
                new_items = report.total_new_items(),
                failures = report.failure_count(),
                elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
                "Cycle complete"
            );
        });

        report
    }

    async fn deliver(&self, report: &CycleReport) {
        match tokio::time::timeout(self.report_timeout, self.reporter.report(report)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(cycle_id = %report.cycle_id, reporter = self.reporter.name(), error = %e, "Reporting failed");
            }
            Err(_) => {
                tracing::warn!(
                    cycle_id = %report.cycle_id,
                    reporter = self.reporter.name(),
                    timeout_secs = self.report_timeout.as_secs_f64(),
                    "Reporter timed out"
                );
            }
        }
    }

    async fn record(&self, report: &CycleReport) {
        counter!("watcher_cycles_total").increment(1);
        gauge!("watcher_last_cycle_timestamp").set(report.finished_at.timestamp() as f64);

        for (name, failure) in report.failures() {
            counter!("watcher_query_failures_total", "query" => name.to_string()).increment(1);
            tracing::debug!(query = %name, error = %failure, "Query failed this cycle");
        }
        for (name, delta) in report.new_items() {
            counter!("watcher_new_listings_total", "query" => name.to_string()).increment(delta.len() as u64);
        }

        let mut stats = self.stats.write().await;
        stats.cycles_completed += 1;
        stats.query_successes += report.success_count() as u64;
        stats.query_failures += report.failure_count() as u64;
        stats.new_listings_reported += report.total_new_items() as u64;
        stats.last_cycle_started = Some(report.started_at);
        stats.last_cycle_finished = Some(report.finished_at);
    }
}

/// Resolves once the flag is true. A dropped sender means nobody can ask for
/// shutdown any more, so this then never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
