use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Delta;
use crate::utils::error::QueryFailure;

/// What a successful query run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// No usable previous snapshot existed; the current one became the baseline.
    Baseline {
        observed: usize,
        /// Set when the baseline had to be re-established because the stored
        /// snapshot could not be decoded.
        recovered_from: Option<String>,
    },
    /// Diffed against the previous snapshot. The delta may be empty.
    NewItems { observed: usize, delta: Delta },
}

impl QueryOutcome {
    pub fn is_baseline(&self) -> bool {
        matches!(self, QueryOutcome::Baseline { .. })
    }

    /// Number of listings the fetch returned this cycle.
    pub fn observed(&self) -> usize {
        match self {
            QueryOutcome::Baseline { observed, .. } | QueryOutcome::NewItems { observed, .. } => {
                *observed
            }
        }
    }

    /// The new listings, if this outcome carries any.
    pub fn delta(&self) -> Option<&Delta> {
        match self {
            QueryOutcome::NewItems { delta, .. } => Some(delta),
            QueryOutcome::Baseline { .. } => None,
        }
    }
}

pub type QueryResult = std::result::Result<QueryOutcome, QueryFailure>;

/// Aggregated results of one poll cycle, keyed by query name.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: BTreeMap<String, QueryResult>,
}

impl CycleReport {
    pub fn new(
        cycle_id: Uuid,
        started_at: DateTime<Utc>,
        results: BTreeMap<String, QueryResult>,
    ) -> Self {
        Self {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            results,
        }
    }

    /// Queries that produced at least one new listing, with their deltas.
    ///
    /// Failed saves still carry the delta they computed and are included.
    pub fn new_items(&self) -> impl Iterator<Item = (&str, &Delta)> {
        self.results.iter().filter_map(|(name, result)| {
            let delta = match result {
                Ok(outcome) => outcome.delta(),
                Err(failure) => failure.delta.as_ref(),
            }?;
            (!delta.is_empty()).then_some((name.as_str(), delta))
        })
    }

    pub fn total_new_items(&self) -> usize {
        self.new_items().map(|(_, delta)| delta.len()).sum()
    }

    pub fn has_new_items(&self) -> bool {
        self.new_items().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &QueryFailure)> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|f| (name.as_str(), f)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn success_count(&self) -> usize {
        self.results.len() - self.failure_count()
    }
}
