//! Unified error type for every boundary in the relay.
//!
//! The same taxonomy is used for route responses and adapter results:
//! invalid input, upstream unreachable, upstream-reported failure, and
//! responses the adapter could not decode.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    /// The request was rejected before any upstream call was made.
    #[error("{0}")]
    InvalidInput(String),

    /// The upstream endpoint could not be reached (connect/timeout/transport).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream endpoint answered with a non-success status.
    #[error("upstream error ({status}): {message}")]
    UpstreamError { status: u16, message: String },

    /// The upstream body did not match the expected shape.
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnavailable(_)
            | RelayError::UpstreamError { .. }
            | RelayError::MalformedResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RelayError::MalformedResponse(err.to_string())
        } else {
            RelayError::UpstreamUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::InvalidInput("Prompt is required".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::UpstreamUnavailable("connection refused".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::UpstreamError {
                status: 402,
                message: "payment required".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_includes_upstream_status() {
        let err = RelayError::UpstreamError {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "upstream error (429): rate limited");
    }
}
