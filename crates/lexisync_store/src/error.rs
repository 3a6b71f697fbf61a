//! Error types for the store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not permitted in the transaction's current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A ledger write was attempted without holding the user's row lock.
    #[error("version row for user {user_id:?} is not locked by this transaction")]
    LockNotHeld {
        /// User whose row lock is missing.
        user_id: String,
    },

    /// The store has no file to save to.
    #[error("store is in-memory and has no snapshot path")]
    NoSnapshotPath,
}

impl StoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a lock-not-held error.
    pub fn lock_not_held(user_id: impl Into<String>) -> Self {
        Self::LockNotHeld {
            user_id: user_id.into(),
        }
    }
}
