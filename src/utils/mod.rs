pub mod error;

pub use error::{FetchError, QueryError, QueryFailure, ReportError, StoreError};
