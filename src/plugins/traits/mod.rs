pub mod fetcher;
pub mod reporter;

pub use fetcher::ListingFetcher;
pub use reporter::Reporter;
