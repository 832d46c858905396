//! The seam between the orchestrator and the remote dashboard service.

use super::error::FetchError;
use super::model::{
    CompositePayload, CountryMetric, DetailTable, HealthStatus, IndustryMetric, RefreshAck,
    SectorMetric, TariffMeasure, TimePoint,
};
use async_trait::async_trait;

/// Read and refresh operations offered by the dashboard service.
///
/// `fetch_composite` returns `Ok(None)` when the service answers but has no
/// aggregate payload to give.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn fetch_composite(&self) -> Result<Option<CompositePayload>, FetchError>;
    async fn fetch_heatmap(&self) -> Result<Vec<CountryMetric>, FetchError>;
    async fn fetch_sectors(&self) -> Result<Vec<SectorMetric>, FetchError>;
    async fn fetch_time_series(&self) -> Result<Vec<TimePoint>, FetchError>;
    async fn fetch_detail_table(&self) -> Result<DetailTable, FetchError>;
    async fn fetch_countries(&self) -> Result<Vec<CountryMetric>, FetchError>;
    async fn fetch_industries(&self) -> Result<Vec<IndustryMetric>, FetchError>;
    async fn fetch_measures(&self) -> Result<Vec<TariffMeasure>, FetchError>;
    /// Asks the service to recompute its data.
    async fn trigger_refresh(&self) -> Result<RefreshAck, FetchError>;
    async fn health(&self) -> Result<HealthStatus, FetchError>;
}
