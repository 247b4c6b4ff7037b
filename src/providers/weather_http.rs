use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::weather::{AggregatedWeather, CurrentWeather, DailyForecast, WeatherProvider};
use super::{classify_status, classify_transport, ProviderError};
use crate::config::WeatherConfig;
use crate::error::{AnalysisError, AnalysisResult};

/// HTTP client for the meteorological API.
pub struct MeteoApiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    temp_c: f64,
    humidity_pct: f64,
    wind_ms: f64,
    precip_mm: f64,
    condition: String,
    observed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    days: Vec<ForecastDayEntry>,
}

#[derive(Debug, Deserialize)]
struct ForecastDayEntry {
    date: NaiveDate,
    temp_min_c: f64,
    temp_max_c: f64,
    humidity_pct: f64,
    wind_ms: f64,
    precip_probability_pct: f64,
    precip_mm: f64,
}

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    window_days: u32,
    avg_temp_c: f64,
    avg_humidity_pct: f64,
    total_precip_mm: f64,
    dry_day_count: u32,
    irrigation_need: bool,
    growing_degree_days: f64,
}

impl MeteoApiClient {
    pub fn new(config: &WeatherConfig) -> AnalysisResult<Self> {
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

    fn point_query(lat: f64, lng: f64) -> Vec<(&'static str, String)> {
        vec![("lat", lat.to_string()), ("lng", lng.to_string())]
    }
}

#[async_trait]
impl WeatherProvider for MeteoApiClient {
    async fn current(&self, lat: f64, lng: f64) -> Result<CurrentWeather, ProviderError> {
        let response: CurrentResponse = self
            .get_json("/v1/current", &Self::point_query(lat, lng))
            .await?;
        Ok(CurrentWeather {
            temperature_c: response.temp_c,
            humidity_pct: response.humidity_pct,
            wind_speed_ms: response.wind_ms,
            precipitation_mm: response.precip_mm,
            condition: response.condition,
            observed_at: response.observed_at,
        })
    }

    async fn forecast(
        &self,
        lat: f64,
        lng: f64,
        days: u32,
    ) -> Result<Vec<DailyForecast>, ProviderError> {
        if days == 0 || days > 16 {
            return Err(ProviderError::InvalidRequest(format!(
                "forecast horizon must be 1-16 days, got {days}"
            )));
        }
        let mut query = Self::point_query(lat, lng);
        query.push(("days", days.to_string()));

        let response: ForecastResponse = self.get_json("/v1/forecast", &query).await?;
        Ok(response
            .days
            .into_iter()
            .map(|entry| DailyForecast {
                date: entry.date,
                temp_min_c: entry.temp_min_c,
                temp_max_c: entry.temp_max_c,
                humidity_pct: entry.humidity_pct,
                wind_speed_ms: entry.wind_ms,
                precipitation_probability_pct: entry.precip_probability_pct,
                precipitation_mm: entry.precip_mm,
            })
            .collect())
    }

    async fn aggregate(
        &self,
        lat: f64,
        lng: f64,
        window_days: u32,
    ) -> Result<AggregatedWeather, ProviderError> {
        let mut query = Self::point_query(lat, lng);
        query.push(("window_days", window_days.to_string()));

        let response: AggregateResponse = self.get_json("/v1/aggregate", &query).await?;
        Ok(AggregatedWeather {
            window_days: response.window_days,
            avg_temp_c: response.avg_temp_c,
            avg_humidity_pct: response.avg_humidity_pct,
            total_precipitation_mm: response.total_precip_mm,
            dry_day_count: response.dry_day_count,
            irrigation_need: response.irrigation_need,
            growing_degree_days: response.growing_degree_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> MeteoApiClient {
        let mut config = Config::default().weather;
        config.base_url = server.uri();
        MeteoApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_current_parses_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "temp_c": 1.0,
                "humidity_pct": 88.0,
                "wind_ms": 2.0,
                "precip_mm": 0.0,
                "condition": "clear",
                "observed_at": "2024-10-12T05:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let current = client.current(41.0, -93.0).await.unwrap();
        assert!((current.temperature_c - 1.0).abs() < 1e-9);
        assert_eq!(current.condition, "clear");
    }

    #[tokio::test]
    async fn test_forecast_horizon_validated() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let err = client.forecast(41.0, -93.0, 0).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_forecast_parses_days() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("days", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "days": [
                    {"date": "2024-10-13", "temp_min_c": -1.0, "temp_max_c": 9.0,
                     "humidity_pct": 85.0, "wind_ms": 3.0,
                     "precip_probability_pct": 10.0, "precip_mm": 0.0},
                    {"date": "2024-10-14", "temp_min_c": 2.0, "temp_max_c": 12.0,
                     "humidity_pct": 70.0, "wind_ms": 5.0,
                     "precip_probability_pct": 40.0, "precip_mm": 2.5}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let days = client.forecast(41.0, -93.0, 2).await.unwrap();
        assert_eq!(days.len(), 2);
        assert!((days[0].temp_min_c + 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/aggregate"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.aggregate(41.0, -93.0, 14).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
    }
}
