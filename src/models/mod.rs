pub mod listing;
pub mod report;

// Re-exports for convenience
pub use listing::*;
pub use report::*;
