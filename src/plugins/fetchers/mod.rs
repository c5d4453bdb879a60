// Fetcher plugin implementations
pub mod vinted;

pub use vinted::VintedFetcher;
