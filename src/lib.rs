pub mod config;
pub mod core;
pub mod models;
pub mod plugins;
pub mod scheduler;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{CycleReport, Delta, ListingRecord, ListingSet, QueryOutcome, QueryResult, QuerySpec};
pub use scheduler::{CoordinatorState, PollCoordinator};
pub use utils::error::{FetchError, QueryError, QueryFailure, ReportError, StoreError};
