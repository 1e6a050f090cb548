//! Application-wide error types.

use std::time::Duration;

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// A required field was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The recording backend could not be reached or failed internally.
    #[error("Recording backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The recording backend understood the request but declined it.
    #[error("Recording backend rejected request ({code}): {message}")]
    BackendRejected { code: String, message: String },

    /// The egress handle is unknown to the backend.
    #[error("Egress not found: {0}")]
    HandleNotFound(String),

    /// The backend did not answer within the configured bound.
    #[error("Recording backend timed out after {}s during {operation}", .timeout.as_secs_f64())]
    BackendTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// A recording for this session is already starting or active.
    #[error("Session {session_id} already has an active egress ({})", .egress_id.as_deref().unwrap_or("starting"))]
    SessionActive {
        session_id: String,
        egress_id: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendRejected {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the caller, rather than the backend, is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::HandleNotFound(_) | Self::SessionActive { .. }
        )
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::BackendTimeout { .. }
        )
    }
}
