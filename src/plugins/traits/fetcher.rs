use async_trait::async_trait;

use crate::models::ListingSet;
use crate::utils::error::FetchError;

/// Source of listings for a query endpoint (a catalog search URL, an API query, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Everything the source currently returns for `endpoint`, with freshness
    /// evaluated at the moment of the call.
    async fn fetch(&self, endpoint: &str) -> Result<ListingSet, FetchError>;
}
