//! Error types for the comparison engine

use thiserror::Error;

/// Result type for engine setup
pub type CompareResult<T> = Result<T, CompareError>;

/// Errors that abort a run before anything is dispatched
#[derive(Debug, Error)]
pub enum CompareError {
    /// Missing or invalid endpoint registry / run settings
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A declared result schema could not be compiled
    #[error("result schema for '{method}' does not compile: {reason}")]
    InvalidSchema { method: String, reason: String },
}

/// Failure of a single endpoint call
///
/// Recorded on the endpoint's response and never propagated: sibling calls
/// keep going and the descriptor is classified as a call error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("batch response carried {received} entries for {sent} requests")]
    BatchMismatch { sent: usize, received: usize },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = err.status() {
            TransportError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() || err.is_body() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}
