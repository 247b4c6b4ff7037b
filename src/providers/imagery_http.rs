use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::imagery::{AcquisitionSummary, ImageryProvider, TimeSeriesPoint};
use super::{classify_status, classify_transport, ProviderError};
use crate::config::ImageryConfig;
use crate::domain::{BoundingBox, HistogramBin, NdviHistogram, VegetationIndices};
use crate::error::{AnalysisError, AnalysisResult};

/// HTTP client for the spectral-indices API.
///
/// The base URL is configurable so tests can point it at a local mock
/// server; the concrete type never leaves the provider module.
pub struct SpectralApiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    acquisitions: Vec<AcquisitionEntry>,
}

#[derive(Debug, Deserialize)]
struct AcquisitionEntry {
    id: String,
    date: NaiveDate,
    cloud_pct: f64,
    resolution_m: f64,
}

#[derive(Debug, Deserialize)]
struct IndicesResponse {
    ndvi: NdviStats,
    ndre: f64,
    evi: f64,
    savi: f64,
    cloud_pct: f64,
    captured_at: DateTime<Utc>,
    resolution_m: f64,
    histogram: Option<Vec<HistogramBinEntry>>,
}

#[derive(Debug, Deserialize)]
struct NdviStats {
    mean: f64,
    min: f64,
    max: f64,
    median: f64,
    std_dev: f64,
}

#[derive(Debug, Deserialize)]
struct HistogramBinEntry {
    lower: f64,
    upper: f64,
    fraction: f64,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    points: Vec<TimeSeriesEntry>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesEntry {
    date: NaiveDate,
    ndvi_mean: f64,
    cloud_pct: f64,
}

impl SpectralApiClient {
    pub fn new(config: &ImageryConfig) -> AnalysisResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent("fieldsense/0.1 field analysis pipeline")
            .build()
            .map_err(|e| AnalysisError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut request = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("malformed response: {e}")))
    }

    fn bbox_query(bbox: &BoundingBox) -> Vec<(&'static str, String)> {
        vec![
            ("west", bbox.west.to_string()),
            ("south", bbox.south.to_string()),
            ("east", bbox.east.to_string()),
            ("north", bbox.north.to_string()),
        ]
    }
}

#[async_trait]
impl ImageryProvider for SpectralApiClient {
    async fn search(
        &self,
        bbox: &BoundingBox,
        date_range: (NaiveDate, NaiveDate),
        max_cloud_pct: f64,
    ) -> Result<Vec<AcquisitionSummary>, ProviderError> {
        let mut query = Self::bbox_query(bbox);
        query.push(("from", date_range.0.to_string()));
        query.push(("to", date_range.1.to_string()));
        query.push(("max_cloud_pct", max_cloud_pct.to_string()));

        let response: SearchResponse = self.get_json("/v1/acquisitions", &query).await?;
        Ok(response
            .acquisitions
            .into_iter()
            .map(|entry| AcquisitionSummary {
                id: entry.id,
                date: entry.date,
                cloud_pct: entry.cloud_pct,
                resolution_meters: entry.resolution_m,
            })
            .collect())
    }

    async fn indices(
        &self,
        bbox: &BoundingBox,
        date: NaiveDate,
    ) -> Result<VegetationIndices, ProviderError> {
        let mut query = Self::bbox_query(bbox);
        query.push(("date", date.to_string()));

        let response: IndicesResponse = self.get_json("/v1/indices", &query).await?;

        let indices = VegetationIndices {
            ndvi_mean: response.ndvi.mean,
            ndvi_min: response.ndvi.min,
            ndvi_max: response.ndvi.max,
            ndvi_median: response.ndvi.median,
            ndvi_std_dev: response.ndvi.std_dev,
            ndre: response.ndre,
            evi: response.evi,
            savi: response.savi,
            cloud_cover_pct: response.cloud_pct,
            captured_at: response.captured_at,
            resolution_meters: response.resolution_m,
            histogram: response.histogram.map(|bins| NdviHistogram {
                bins: bins
                    .into_iter()
                    .map(|bin| HistogramBin {
                        lower: bin.lower,
                        upper: bin.upper,
                        fraction: bin.fraction,
                    })
                    .collect(),
            }),
        };

        indices
            .validate()
            .map_err(|e| ProviderError::Unavailable(format!("inconsistent indices: {e}")))?;
        Ok(indices)
    }

    async fn time_series(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
        step_days: u32,
    ) -> Result<Vec<TimeSeriesPoint>, ProviderError> {
        if end < start {
            return Err(ProviderError::InvalidRequest(format!(
                "time series end {end} precedes start {start}"
            )));
        }
        let mut query = Self::bbox_query(bbox);
        query.push(("from", start.to_string()));
        query.push(("to", end.to_string()));
        query.push(("step_days", step_days.max(1).to_string()));

        let response: TimeSeriesResponse = self.get_json("/v1/timeseries", &query).await?;
        Ok(response
            .points
            .into_iter()
            .map(|entry| TimeSeriesPoint {
                date: entry.date,
                ndvi_mean: entry.ndvi_mean,
                cloud_pct: entry.cloud_pct,
            })
            .collect())
    }
}
