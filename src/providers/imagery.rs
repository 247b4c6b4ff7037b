use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::domain::{BoundingBox, VegetationIndices};

/// One candidate acquisition returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub id: String,
    pub date: NaiveDate,
    pub cloud_pct: f64,
    pub resolution_meters: f64,
}

/// One sample of an NDVI time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub ndvi_mean: f64,
    pub cloud_pct: f64,
}

/// Remote-sensing capability the analysis core consumes.
///
/// Implementations surface the shared failure taxonomy: `Transient` is
/// retried with backoff, `Unavailable` means no usable imagery for the
/// request, `InvalidRequest` is never retried.
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    /// List acquisitions over `bbox` within the date range, filtered to the
    /// given cloud ceiling.
    async fn search(
        &self,
        bbox: &BoundingBox,
        date_range: (NaiveDate, NaiveDate),
        max_cloud_pct: f64,
    ) -> Result<Vec<AcquisitionSummary>, ProviderError>;

    /// Aggregated vegetation indices for `bbox` at `date`.
    async fn indices(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
    ) -> Result<VegetationIndices, ProviderError>;

    /// Ordered NDVI samples between `start` and `end`, one per `step_days`.
    async fn time_series(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
        step_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, ProviderError>;
}
