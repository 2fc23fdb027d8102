//! Error types for the Activity Tracker

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pulse_store::StoreError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Distinguishes a caller's malformed request from backend trouble, so the
/// caller knows whether a retry can help.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl TrackerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_retryable() {
            tracing::warn!(error = %self, "Request failed on the store side");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": self.error_code(),
        }));

        (status, body).into_response()
    }
}

impl From<TrackerError> for pulse_core::PulseError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::InvalidInput(msg) => pulse_core::PulseError::Validation(msg),
            TrackerError::StoreUnavailable(e) => e.into(),
            TrackerError::DeadlineExceeded => {
                pulse_core::PulseError::Timeout("deadline exceeded".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TrackerError::invalid("missing userID").status_code(),
            StatusCode::BAD_REQUEST
        );
        let unavailable = TrackerError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(unavailable.is_retryable());
        assert_eq!(
            TrackerError::DeadlineExceeded.error_code(),
            "DEADLINE_EXCEEDED"
        );
    }

    #[test]
    fn test_converts_into_platform_error() {
        let err: pulse_core::PulseError = TrackerError::invalid("missing userID").into();
        assert_eq!(err.status_code(), 400);
        let err: pulse_core::PulseError = TrackerError::DeadlineExceeded.into();
        assert_eq!(err.status_code(), 504);
    }
}
