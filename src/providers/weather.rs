use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// Observed conditions at a point, right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub precipitation_mm: f64,
    pub condition: String,
    pub observed_at: DateTime<Utc>,
}

/// One day of forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub precipitation_probability_pct: f64,
    pub precipitation_mm: f64,
}

/// Aggregated history over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedWeather {
    pub window_days: u32,
    pub avg_temp_c: f64,
    pub avg_humidity_pct: f64,
    pub total_precipitation_mm: f64,
    pub dry_day_count: u32,
    pub irrigation_need: bool,
    /// Accumulated heat above the 10 °C base.
    pub growing_degree_days: f64,
}

/// Weather capability the analysis core consumes. Same failure taxonomy as
/// the imagery provider.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, lat: f64, lng: f64) -> Result<CurrentWeather, ProviderError>;

    async fn forecast(
        &self,
        lat: f64,
        lng: f64,
        days: u32,
    ) -> Result<Vec<DailyForecast>, ProviderError>;

    async fn aggregate(
        &self,
        lat: f64,
        lng: f64,
        window_days: u32,
    ) -> Result<AggregatedWeather, ProviderError>;
}
