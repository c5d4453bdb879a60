pub mod fetchers;
pub mod manager;
pub mod reporters;
pub mod traits;

pub use manager::ReporterSet;
pub use traits::{ListingFetcher, Reporter};
