//! Error types for rumor

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// rumor error types
#[derive(Debug, Error)]
pub enum Error {
    /// Record could not be serialized to JSON
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// Bytes were not a valid JSON node record
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),
}
