//! Error types for chain access.

use thiserror::Error;

/// Chain client error.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// The gateway could not be reached or the connection dropped.
    #[error("Chain transport error: {0}")]
    Transport(String),

    /// The gateway answered with a JSON-RPC error object.
    #[error("Chain RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message reported by the gateway.
        message: String,
    },

    /// A response or storage row could not be decoded.
    #[error("Chain decode error: {0}")]
    Decode(String),

    /// The client is not connected.
    #[error("Chain client unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChainError::Decode(err.to_string())
        } else {
            ChainError::Transport(err.to_string())
        }
    }
}

/// Result type alias for ChainError.
pub type Result<T> = std::result::Result<T, ChainError>;
