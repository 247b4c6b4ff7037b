//! Capability interfaces the core consumes (imagery, weather) and their
//! HTTP-backed implementations. Concrete client types never leak past this
//! module boundary.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::RetryConfig;

pub mod imagery;
pub mod imagery_http;
pub mod weather;
pub mod weather_http;

pub use imagery::{AcquisitionSummary, ImageryProvider, TimeSeriesPoint};
pub use imagery_http::SpectralApiClient;
pub use weather::{AggregatedWeather, CurrentWeather, DailyForecast, WeatherProvider};
pub use weather_http::MeteoApiClient;

/// Failure taxonomy every provider surfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Worth retrying with backoff.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// The provider cannot serve this request; callers fall through to
    /// cached or historical data where configured.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The request itself is wrong; retrying will not help.
    #[error("invalid provider request: {0}")]
    InvalidRequest(String),
}

/// Exponential backoff policy with percentage jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub factor: f64,
    pub jitter_pct: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts,
            base: Duration::from_millis(config.base_ms),
            factor: config.factor,
            jitter_pct: config.jitter_pct,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), with ±jitter applied.
    fn backoff(&self, attempt: u32) -> Duration {
        let exact = self.base.as_millis() as f64 * self.factor.powi(attempt.saturating_sub(1) as i32);
        let jitter_span = exact * (self.jitter_pct as f64 / 100.0);
        let jitter = if jitter_span > 0.0 {
            rand::thread_rng().gen_range(-jitter_span..=jitter_span)
        } else {
            0.0
        };
        Duration::from_millis((exact + jitter).max(0.0) as u64)
    }
}

/// Run `call`, retrying transient failures per `policy`. After the attempt
/// cap a transient failure degrades to `Unavailable`; other failure kinds
/// pass through untouched on the first occurrence.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(ProviderError::Transient(message)) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(ProviderError::Unavailable(format!(
                        "{operation} still failing after {attempt} attempts: {message}"
                    )));
                }
                let backoff = policy.backoff(attempt);
                warn!(
                    operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %message,
                    "transient provider failure, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Map an HTTP response status to the provider failure taxonomy.
pub(crate) fn classify_status(status: reqwest::StatusCode, body_hint: &str) -> ProviderError {
    if status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::Transient(format!("upstream returned {status}: {body_hint}"))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        ProviderError::Unavailable(format!("no data for request: {body_hint}"))
    } else {
        ProviderError::InvalidRequest(format!("upstream rejected request ({status}): {body_hint}"))
    }
}

/// Map a reqwest transport error to the provider failure taxonomy.
pub(crate) fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ProviderError::Transient(err.to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base: Duration::from_millis(1),
            factor: 2.0,
            jitter_pct: 20,
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), "indices", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Transient("flaky".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_cap_degrades_to_unavailable() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry(&fast_policy(4), "indices", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Transient("down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = with_retry(&fast_policy(4), "indices", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::InvalidRequest("bad bbox".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_growth() {
        let policy = RetryPolicy {
            attempts: 4,
            base: Duration::from_millis(250),
            factor: 2.0,
            jitter_pct: 0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            ProviderError::InvalidRequest(_)
        ));
    }
}
