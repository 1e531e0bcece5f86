use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type InferenceResult<T> = std::result::Result<T, InferenceError>;

/// Main error type for the InferenceClient
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Request timed out
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Server could not be reached
    #[error("could not connect to inference server: {0}")]
    Connection(String),

    /// Unexpected HTTP status code
    #[error("unexpected status {0}: {1}")]
    UnexpectedStatus(StatusCode, String),

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid request parameters
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Http(reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Coarse classification of a failure, exposed alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Connection,
    Status,
    Malformed,
    InvalidRequest,
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::Status => "status",
            FailureKind::Malformed => "malformed",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Transport => "transport",
        };
        f.write_str(s)
    }
}

impl InferenceError {
    /// Classify a reqwest error raised while a request bounded by `timeout` was in flight.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout(timeout)
        } else if err.is_connect() {
            InferenceError::Connection(err.to_string())
        } else if err.is_decode() {
            InferenceError::MalformedResponse(err.to_string())
        } else {
            InferenceError::Http(err)
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            InferenceError::Timeout(_) => FailureKind::Timeout,
            InferenceError::Connection(_) => FailureKind::Connection,
            InferenceError::UnexpectedStatus(_, _) => FailureKind::Status,
            InferenceError::MalformedResponse(_) | InferenceError::Json(_) => {
                FailureKind::Malformed
            }
            InferenceError::InvalidRequest(_)
            | InferenceError::Configuration(_)
            | InferenceError::Url(_) => FailureKind::InvalidRequest,
            InferenceError::Http(_) => FailureKind::Transport,
        }
    }

    /// Check if a caller-side retry is reasonable. The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Timeout(_) => true,
            InferenceError::Connection(_) => true,
            InferenceError::UnexpectedStatus(status, _) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            InferenceError::UnexpectedStatus(status, _) => Some(*status),
            _ => None,
        }
    }
}
