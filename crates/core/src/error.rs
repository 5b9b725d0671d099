//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Address is not valid base58.
    #[error("Invalid address encoding: {0}")]
    InvalidAddress(String),

    /// Address has the wrong textual or decoded length.
    #[error("Invalid address length: {0}")]
    InvalidAddressLength(usize),

    /// Address was encoded for a different network.
    #[error("Unsupported SS58 prefix: {0} (expected 42)")]
    InvalidPrefix(u8),

    /// Checksum bytes do not match the payload.
    #[error("Invalid SS58 checksum")]
    InvalidChecksum,

    /// Unknown stake type string.
    #[error("Invalid stake type: {0}")]
    InvalidStakeType(String),

    /// Unknown stake status string.
    #[error("Invalid stake status: {0}")]
    InvalidStakeStatus(String),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
