//! Error types for the sync server.

use lexisync_protocol::{codes, FailureKind, Operation, ProtocolError};
use lexisync_store::StoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or limits.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The client presented a stale version.
    #[error("version conflict: expected {expected}, server is at {actual}")]
    VersionConflict {
        /// Version presented by the client.
        expected: u64,
        /// Version held by the server.
        actual: u64,
    },

    /// The ledger compare-and-swap failed while the row lock was held.
    #[error("version compare-and-swap failed at {expected}, possible concurrent modification")]
    CasFailed {
        /// Version the swap expected.
        expected: u64,
    },

    /// A post-sync invariant failed.
    #[error("{issue_type}: {details}")]
    IntegrityViolation {
        /// Issue type recorded in diagnostics.
        issue_type: String,
        /// Expected and actual state.
        details: String,
    },

    /// Applying one mutation failed.
    #[error("failed to apply {table}/{record_id} for user {user_id}: {source}")]
    Apply {
        /// Pushing user.
        user_id: String,
        /// Target table.
        table: String,
        /// Target record.
        record_id: String,
        /// Underlying failure.
        #[source]
        source: Box<ServerError>,
    },

    /// The table does not accept this operation.
    #[error("{operation} is not supported on table {table}")]
    UnsupportedOperation {
        /// Target table.
        table: String,
        /// Rejected operation.
        operation: Operation,
    },

    /// The payload could not be decoded into the table's record type.
    #[error("invalid payload for {table}: {message}")]
    InvalidPayload {
        /// Target table.
        table: String,
        /// Decoding failure.
        message: String,
    },

    /// A BATCH_DELETE filter was rejected.
    #[error("invalid filter for {table}: {message}")]
    InvalidFilter {
        /// Target table.
        table: String,
        /// Why the filter was rejected.
        message: String,
    },

    /// The record id exceeds the storage limit.
    #[error("record id is {len} characters, limit is {limit}")]
    RecordIdTooLong {
        /// Actual length in characters.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The log's record id is not the key its payload maps to.
    #[error("record id {record_id:?} does not match key {key:?} in {table}")]
    RecordIdMismatch {
        /// Target table.
        table: String,
        /// Record id sent by the client.
        record_id: String,
        /// Key derived from the payload.
        key: String,
    },

    /// The record belongs to another user.
    #[error("record in {table} does not belong to user {user_id}")]
    OwnershipMismatch {
        /// Target table.
        table: String,
        /// Pushing user.
        user_id: String,
    },

    /// The ranking hook failed after the version was advanced.
    #[error("ranking update failed: {0}")]
    RankingFailed(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Creates an invalid payload error.
    pub fn invalid_payload(table: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPayload {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(table: impl Into<String>, operation: Operation) -> Self {
        Self::UnsupportedOperation {
            table: table.into(),
            operation,
        }
    }

    /// Creates an ownership mismatch error.
    pub fn ownership(table: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::OwnershipMismatch {
            table: table.into(),
            user_id: user_id.into(),
        }
    }

    /// Creates a record id mismatch error.
    pub fn record_id_mismatch(
        table: impl Into<String>,
        record_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::RecordIdMismatch {
            table: table.into(),
            record_id: record_id.into(),
            key: key.into(),
        }
    }

    /// Wraps a failure with the mutation it happened on.
    pub fn apply(
        user_id: impl Into<String>,
        table: impl Into<String>,
        record_id: impl Into<String>,
        source: ServerError,
    ) -> Self {
        Self::Apply {
            user_id: user_id.into(),
            table: table.into(),
            record_id: record_id.into(),
            source: Box::new(source),
        }
    }

    /// Maps the error onto the client-facing taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            ServerError::VersionConflict { .. } | ServerError::CasFailed { .. } => {
                FailureKind::VersionConflict
            }
            ServerError::IntegrityViolation { .. } | ServerError::RecordIdMismatch { .. } => {
                FailureKind::IntegrityViolation
            }
            ServerError::Apply { source, .. } => source.kind(),
            _ => FailureKind::Unexpected,
        }
    }

    /// Returns the machine-readable failure code.
    pub fn code(&self) -> &str {
        match self {
            ServerError::VersionConflict { .. } | ServerError::CasFailed { .. } => {
                codes::DB_VERSION_NOT_MATCH
            }
            ServerError::IntegrityViolation { issue_type, .. } => issue_type,
            ServerError::RecordIdMismatch { .. } => codes::RECORD_ID_MISMATCH,
            ServerError::Apply { source, .. } => source.code(),
            _ => codes::SYNC_FAILED,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::VersionConflict { .. }
            | ServerError::IntegrityViolation { .. }
            | ServerError::UnsupportedOperation { .. }
            | ServerError::InvalidPayload { .. }
            | ServerError::InvalidFilter { .. }
            | ServerError::RecordIdTooLong { .. }
            | ServerError::RecordIdMismatch { .. }
            | ServerError::OwnershipMismatch { .. }
            | ServerError::Protocol(_)
            | ServerError::Json(_) => true,
            ServerError::Apply { source, .. } => source.is_client_error(),
            _ => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::CasFailed { expected: 3 }.is_server_error());
        assert!(ServerError::RankingFailed("down".into()).is_server_error());
    }

    #[test]
    fn kinds_and_codes() {
        let conflict = ServerError::VersionConflict {
            expected: 5,
            actual: 6,
        };
        assert_eq!(conflict.kind(), FailureKind::VersionConflict);
        assert_eq!(conflict.code(), codes::DB_VERSION_NOT_MATCH);

        let cas = ServerError::CasFailed { expected: 5 };
        assert_eq!(cas.kind(), FailureKind::VersionConflict);

        let integrity = ServerError::IntegrityViolation {
            issue_type: codes::RAW_WORD_ORDER_INVALID.into(),
            details: "gap".into(),
        };
        assert_eq!(integrity.kind(), FailureKind::IntegrityViolation);
        assert_eq!(integrity.code(), codes::RAW_WORD_ORDER_INVALID);

        let wrapped = ServerError::apply(
            "u1",
            "user_oper",
            "op1",
            ServerError::unsupported("user_oper", Operation::Delete),
        );
        assert_eq!(wrapped.kind(), FailureKind::Unexpected);
        assert_eq!(wrapped.code(), codes::SYNC_FAILED);

        let mismatch = ServerError::apply(
            "u1",
            "daka",
            "u1-20240101",
            ServerError::record_id_mismatch("daka", "u1-20240101", "u1-20231231"),
        );
        assert_eq!(mismatch.kind(), FailureKind::IntegrityViolation);
        assert_eq!(mismatch.code(), codes::RECORD_ID_MISMATCH);
        assert!(mismatch.is_client_error());
    }

    #[test]
    fn apply_error_names_context() {
        let err = ServerError::apply(
            "u1",
            "daka",
            "u1-20240101",
            ServerError::invalid_payload("daka", "missing field `userId`"),
        );
        let msg = err.to_string();
        assert!(msg.contains("u1"));
        assert!(msg.contains("daka/u1-20240101"));
        assert!(msg.contains("userId"));
    }
}
