//! Error types for the analysis service client

use snqb_core::RetryError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the analysis service
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A retried call used up its attempt budget
    #[error("{operation} failed after {attempts} attempt(s): {last_reason}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_reason: String,
    },
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if the error comes from an exhausted retry budget
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

impl From<RetryError<ClientError>> for ClientError {
    fn from(err: RetryError<ClientError>) -> Self {
        match err {
            RetryError::Exhausted {
                operation,
                attempts,
                last_reason,
            } => Self::RetriesExhausted {
                operation,
                attempts,
                last_reason,
            },
            RetryError::Aborted(e) => e,
        }
    }
}
