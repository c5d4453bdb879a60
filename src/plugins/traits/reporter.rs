use async_trait::async_trait;

use crate::models::CycleReport;
use crate::utils::error::ReportError;

/// Receives the aggregated result of every completed poll cycle.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    async fn report(&self, report: &CycleReport) -> Result<(), ReportError>;
}
