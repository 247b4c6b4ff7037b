use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// No usable imagery for the requested bounding box and date
    #[error("Imagery unavailable: {message}")]
    ImageryUnavailable { message: String },

    /// Weather provider could not supply data
    #[error("Weather unavailable: {message}")]
    WeatherUnavailable { message: String },

    /// Caller supplied an invalid farm, field, or parameter
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Concurrent writers collided on an upsert key
    #[error("Persistence conflict: {message}")]
    PersistenceConflict { message: String },

    /// Persistence backend failure
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Notification sink rejected a dispatch
    #[error("Notification failure: {message}")]
    NotificationFailure { message: String },

    /// A per-field deadline or per-call timeout elapsed
    #[error("Timed out: {message}")]
    Timeout { message: String },

    /// Cooperative cancellation was observed between pipeline steps
    #[error("Cancelled: {message}")]
    Cancelled { message: String },

    /// HTTP request errors from provider clients
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// External service errors
    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AnalysisError {
    /// Create a new imagery-unavailable error
    pub fn imagery_unavailable<T: Into<String>>(message: T) -> Self {
        Self::ImageryUnavailable {
            message: message.into(),
        }
    }

    /// Create a new weather-unavailable error
    pub fn weather_unavailable<T: Into<String>>(message: T) -> Self {
        Self::WeatherUnavailable {
            message: message.into(),
        }
    }

    /// Create a new invalid-input error
    pub fn invalid_input<T: Into<String>>(message: T) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new persistence-conflict error
    pub fn persistence_conflict<T: Into<String>>(message: T) -> Self {
        Self::PersistenceConflict {
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence<T: Into<String>>(message: T) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a new notification-failure error
    pub fn notification<T: Into<String>>(message: T) -> Self {
        Self::NotificationFailure {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<T: Into<String>>(message: T) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new cancelled error
    pub fn cancelled<T: Into<String>>(message: T) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Create a new external service error
    pub fn external_service<T: Into<String>, U: Into<String>>(service: T, message: U) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error into the structured kind recorded in a farm bundle.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::ImageryUnavailable { .. } => FailureKind::ImageryUnavailable,
            Self::WeatherUnavailable { .. } => FailureKind::WeatherUnavailable,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::PersistenceConflict { .. } | Self::Persistence { .. } => FailureKind::Persistence,
            Self::InvalidInput { .. } => FailureKind::InvalidInput,
            _ => FailureKind::Internal,
        }
    }
}

/// Result type alias for the crate
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Structured classification of a single-field failure inside a farm batch.
///
/// The batch entrypoint never raises for these; callers read them out of
/// `FarmAnalysisBundle::failures`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ImageryUnavailable,
    WeatherUnavailable,
    Timeout,
    Cancelled,
    Persistence,
    InvalidInput,
    Internal,
}

/// Per-field failure record inside a farm bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub field_id: String,
    pub analysis_date: NaiveDate,
    pub kind: FailureKind,
    pub detail: String,
}

impl FieldFailure {
    pub fn from_error(field_id: &str, analysis_date: NaiveDate, err: &AnalysisError) -> Self {
        Self {
            field_id: field_id.to_string(),
            analysis_date,
            kind: err.failure_kind(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        assert_eq!(
            AnalysisError::imagery_unavailable("no scene").failure_kind(),
            FailureKind::ImageryUnavailable
        );
        assert_eq!(
            AnalysisError::timeout("field deadline").failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            AnalysisError::cancelled("token observed").failure_kind(),
            FailureKind::Cancelled
        );
        assert_eq!(
            AnalysisError::persistence_conflict("key collision").failure_kind(),
            FailureKind::Persistence
        );
        assert_eq!(
            AnalysisError::internal("whoops").failure_kind(),
            FailureKind::Internal
        );
    }

    #[test]
    fn test_field_failure_record() {
        let err = AnalysisError::imagery_unavailable("all acquisitions above cloud cap");
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let failure = FieldFailure::from_error("field-7", date, &err);

        assert_eq!(failure.kind, FailureKind::ImageryUnavailable);
        assert!(failure.detail.contains("cloud cap"));
        assert_eq!(failure.analysis_date, date);
    }

    #[test]
    fn test_error_display() {
        let err = AnalysisError::external_service("spectral-api", "502 from upstream");
        assert_eq!(
            err.to_string(),
            "External service error: spectral-api: 502 from upstream"
        );
    }
}
