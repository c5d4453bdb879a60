// Integration tests for Vinted Watcher
// These tests drive whole poll cycles against real snapshot stores

pub mod poll_cycle_tests;
pub mod store_tests;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use vinted_watcher::core::QueryRunner;
use vinted_watcher::plugins::ReporterSet;
use vinted_watcher::plugins::traits::ListingFetcher;
use vinted_watcher::store::SnapshotStore;
use vinted_watcher::utils::error::FetchError;
use vinted_watcher::{ListingRecord, ListingSet, PollCoordinator, QuerySpec};

/// Replays queued responses per endpoint. An endpoint with nothing queued
/// answers 503.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, VecDeque<Result<ListingSet, u16>>>>,
    calls: Mutex<usize>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, spec: &QuerySpec, listings: ListingSet) {
        self.queue(spec, Ok(listings));
    }

    pub fn push_failure(&self, spec: &QuerySpec, status: u16) {
        self.queue(spec, Err(status));
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn queue(&self, spec: &QuerySpec, response: Result<ListingSet, u16>) {
        self.script
            .lock()
            .unwrap()
            .entry(spec.endpoint.clone())
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl ListingFetcher for ScriptedFetcher {
    async fn fetch(&self, endpoint: &str) -> Result<ListingSet, FetchError> {
        *self.calls.lock().unwrap() += 1;
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(503));

        next.map_err(|status| FetchError::Status {
            status,
            url: endpoint.to_string(),
        })
    }
}

pub fn spec(name: &str) -> QuerySpec {
    QuerySpec::new(
        name,
        format!("https://www.vinted.pl/catalog?search_text={}&order=newest_first", name),
    )
}

pub fn record(id: &str, title: &str, price: i64, is_fresh: bool) -> ListingRecord {
    ListingRecord::new(
        id,
        title,
        Decimal::from(price),
        format!("https://www.vinted.pl/items/{}", id),
        is_fresh,
    )
    .with_currency("PLN")
}

pub fn listings(records: &[ListingRecord]) -> ListingSet {
    records.iter().cloned().collect()
}

/// A coordinator with no reporters, polling every 20ms.
pub fn coordinator(
    queries: Vec<QuerySpec>,
    store: Arc<dyn SnapshotStore>,
    fetcher: Arc<ScriptedFetcher>,
) -> PollCoordinator {
    let runner = Arc::new(QueryRunner::new(store, fetcher));
    PollCoordinator::new(queries, runner, Arc::new(ReporterSet::new()))
        .with_interval(Duration::from_millis(20))
        .with_report_timeout(Duration::from_secs(1))
}

/// Helper to wait for async operations
pub async fn wait_for_condition<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
