//! Errors from the tweet source and scoring backend.

use thiserror::Error;

/// Failure talking to an external text or scoring API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Connection, timeout or other network-level failure.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Network-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Transport(_))
    }

    /// Non-success HTTP status.
    pub fn is_status(&self) -> bool {
        matches!(self, SourceError::Status { .. })
    }

    /// Unexpected response shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, SourceError::Malformed(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            SourceError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// Result type alias for SourceError.
pub type Result<T> = std::result::Result<T, SourceError>;
