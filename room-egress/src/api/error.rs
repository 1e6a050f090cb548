//! API error handling.
//!
//! Every failure is reported as `{"error": <message>, "code": <CODE>}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Error code for programmatic handling
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
    }

    /// Create a 500 error carrying a classified failure.
    pub fn failure(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::failure("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            error: self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::InvalidArgument(msg) => ApiError::bad_request(msg),
            Error::BackendUnavailable(_) => ApiError::failure("BACKEND_UNAVAILABLE", message),
            Error::BackendRejected { .. } => ApiError::failure("BACKEND_REJECTED", message),
            Error::HandleNotFound(_) => ApiError::failure("HANDLE_NOT_FOUND", message),
            Error::BackendTimeout { .. } => ApiError::failure("BACKEND_TIMEOUT", message),
            Error::SessionActive { .. } => ApiError::failure("SESSION_ACTIVE", message),
            _ => {
                tracing::error!("Unexpected error: {}", message);
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, "INVALID_ARGUMENT", rejection.body_text())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_invalid_argument_is_bad_request() {
        let api_err: ApiError = Error::invalid_argument("sessionId is required").into();
        assert_eq!(api_err.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_err.code, "INVALID_ARGUMENT");
        assert_eq!(api_err.message, "sessionId is required");
    }

    #[test]
    fn test_backend_failures_are_classified() {
        let cases = [
            (Error::unavailable("connection refused"), "BACKEND_UNAVAILABLE"),
            (Error::rejected("failed_precondition", "busy"), "BACKEND_REJECTED"),
            (Error::HandleNotFound("EG_x".into()), "HANDLE_NOT_FOUND"),
            (
                Error::BackendTimeout {
                    operation: "StopEgress",
                    timeout: Duration::from_secs(1),
                },
                "BACKEND_TIMEOUT",
            ),
        ];
        for (err, code) in cases {
            let message = err.to_string();
            let api_err = ApiError::from(err);
            assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(api_err.code, code);
            assert_eq!(api_err.message, message);
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let api_err: ApiError = Error::config("LIVEKIT_API_SECRET must be set").into();
        assert_eq!(api_err.code, "INTERNAL_ERROR");
        assert!(!api_err.message.contains("SECRET"));
    }

    #[test]
    fn test_response_body_shape() {
        let body = ApiErrorResponse {
            error: "boom".to_string(),
            code: "BACKEND_UNAVAILABLE".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "boom");
        assert_eq!(json["code"], "BACKEND_UNAVAILABLE");
    }
}
