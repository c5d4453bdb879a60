use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::differ::{DiffOutcome, diff};
use crate::models::{ListingSet, QueryOutcome, QueryResult, QuerySpec};
use crate::plugins::traits::ListingFetcher;
use crate::store::SnapshotStore;
use crate::utils::error::{QueryError, QueryFailure};

/// Runs the load, fetch, diff, save sequence for one query at a time.
pub struct QueryRunner {
    store: Arc<dyn SnapshotStore>,
    fetcher: Arc<dyn ListingFetcher>,
    fetch_timeout: Option<Duration>,
}

impl QueryRunner {
    pub fn new(store: Arc<dyn SnapshotStore>, fetcher: Arc<dyn ListingFetcher>) -> Self {
        Self {
            store,
            fetcher,
            fetch_timeout: None,
        }
    }

    /// Bounds each fetch. A timed-out fetch fails the query and never reaches the save.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub async fn run(&self, spec: &QuerySpec) -> QueryResult {
        let start_time = Instant::now();

        let (previous, recovered_from) = match self.store.load(&spec.name).await {
            Ok(previous) => (previous, None),
            Err(e) if e.is_corrupt() => {
                tracing::warn!(query = %spec.name, error = %e, "Stored snapshot is corrupt, re-establishing baseline");
                (ListingSet::new(), Some(e.to_string()))
            }
            Err(e) => return Err(QueryError::StoreRead(e).into()),
        };

        let current = self.fetch(spec).await?;

        let outcome = diff(&previous, &current);
        let observed = current.len();

        // The fresh snapshot replaces the baseline even when nothing is new.
        if let Err(e) = self.store.save(&spec.name, &current).await {
            tracing::error!(query = %spec.name, error = %e, "Failed to save snapshot");
            return Err(QueryFailure::with_delta(
                QueryError::StoreWrite(e),
                outcome.into_delta(),
            ));
        }

        let result = match outcome {
            DiffOutcome::Baseline => {
                tracing::info!(query = %spec.name, observed, "Baseline established");
                QueryOutcome::Baseline {
                    observed,
                    recovered_from,
                }
            }
            DiffOutcome::NewItems(delta) => {
                tracing::debug!(
                    query = %spec.name,
                    observed,
                    new_items = delta.len(),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Query checked"
                );
                QueryOutcome::NewItems { observed, delta }
            }
        };

        Ok(result)
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<ListingSet, QueryError> {
        let fetch = self.fetcher.fetch(&spec.endpoint);

        let fetched = match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fetch)
                .await
                .map_err(|_| QueryError::Timeout(timeout))?,
            None => fetch.await,
        };

        fetched.map_err(|e| {
            tracing::warn!(query = %spec.name, error = %e, "Fetch failed, keeping previous snapshot");
            QueryError::Fetch(e)
        })
    }
}
