//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding or validating wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Operation name is not one of the known kinds.
    #[error("unknown operation: {0:?}")]
    UnknownOperation(String),

    /// The `record` field is neither a JSON string nor a JSON object.
    #[error("record must be a JSON object or a JSON-encoded string")]
    InvalidRecord,

    /// Message body could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}
