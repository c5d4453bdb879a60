use std::time::Duration;

use thiserror::Error;

use crate::models::Delta;

/// Failures of the snapshot storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The stored payload exists but does not decode as a listing set.
    #[error("Corrupt snapshot for {name}: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl FetchError {
    /// Whether retrying the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(_) | FetchError::Session(_) => true,
            FetchError::Status { status, .. } => *status == 401 || *status == 429 || *status >= 500,
            FetchError::InvalidEndpoint { .. } | FetchError::Decode(_) => false,
        }
    }
}

/// Why a single query failed to complete its cycle.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not read snapshot: {0}")]
    StoreRead(#[source] StoreError),

    #[error("could not save snapshot: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("runner aborted: {0}")]
    Aborted(String),
}

/// A failed query, together with whatever delta was computed before the failure.
///
/// Only a [`QueryError::StoreWrite`] carries a delta: the diff ran against the
/// last good baseline, so its items are still safe to report.
#[derive(Debug)]
pub struct QueryFailure {
    pub error: QueryError,
    pub delta: Option<Delta>,
}

impl QueryFailure {
    pub fn new(error: QueryError) -> Self {
        Self { error, delta: None }
    }

    pub fn with_delta(error: QueryError, delta: Delta) -> Self {
        Self { error, delta: Some(delta) }
    }
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<QueryError> for QueryFailure {
    fn from(error: QueryError) -> Self {
        Self::new(error)
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected message with status {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
