//! Protocol messages for push and pull.

use crate::error::ProtocolResult;
use crate::oplog::{ClientLog, LogEntry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum SyncMessage {
    /// Push request.
    PushRequest(PushRequest),
    /// Push response.
    PushResponse(PushResponse),
    /// Pull request.
    PullRequest(PullRequest),
    /// Pull response.
    PullResponse(PullResponse),
}

impl SyncMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            SyncMessage::PushRequest(_) => 1,
            SyncMessage::PushResponse(_) => 2,
            SyncMessage::PullRequest(_) => 3,
            SyncMessage::PullResponse(_) => 4,
        }
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A batch of client mutations to apply under optimistic concurrency control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// User whose state is being synchronized.
    pub user_id: String,
    /// The server version the client last observed.
    pub expected_server_db_version: u64,
    /// Mutations in the order they must be applied.
    #[serde(default)]
    pub logs: Vec<ClientLog>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(user_id: impl Into<String>, expected_version: u64, logs: Vec<ClientLog>) -> Self {
        Self {
            user_id: user_id.into(),
            expected_server_db_version: expected_version,
            logs,
        }
    }
}

/// Failure codes carried in [`SyncFailure::code`].
pub mod codes {
    /// The presented version does not match the server.
    pub const DB_VERSION_NOT_MATCH: &str = "DB_VERSION_NOT_MATCH";
    /// The raw-word dictionary is not a contiguous 1..N sequence.
    pub const RAW_WORD_ORDER_INVALID: &str = "RAW_WORD_ORDER_INVALID";
    /// A log's `recordId` is not the key its record maps to.
    pub const RECORD_ID_MISMATCH: &str = "RECORD_ID_MISMATCH";
    /// Any other failure.
    pub const SYNC_FAILED: &str = "SYNC_FAILED";
}

/// Error category reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The client's version is stale; pull, then resubmit.
    VersionConflict,
    /// An integrity rule failed; nothing was applied.
    IntegrityViolation,
    /// Anything else; nothing was applied.
    Unexpected,
}

impl FailureKind {
    /// Returns true if resubmitting after a pull can succeed.
    pub fn is_resolvable_by_pull(&self) -> bool {
        matches!(self, FailureKind::VersionConflict)
    }
}

/// Describes why a push failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    /// Error category.
    pub kind: FailureKind,
    /// Machine-readable code (e.g. `DB_VERSION_NOT_MATCH`, `RAW_WORD_ORDER_INVALID`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result of a push. Either `new_version` or `failure` is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// The version the client must present on its next push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_version: Option<u64>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SyncFailure>,
}

impl PushResponse {
    /// Creates a successful response.
    pub fn success(new_version: u64) -> Self {
        Self {
            new_version: Some(new_version),
            failure: None,
        }
    }

    /// Creates a failed response.
    pub fn failed(kind: FailureKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            new_version: None,
            failure: Some(SyncFailure {
                kind,
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    /// Returns true if the push was applied.
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.new_version.is_some()
    }
}

/// Request for the changes a device has not yet applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// User whose changes are requested.
    pub user_id: String,
    /// Last version the client applied.
    pub from_version: u64,
}

impl PullRequest {
    /// Creates a new pull request.
    pub fn new(user_id: impl Into<String>, from_version: u64) -> Self {
        Self {
            user_id: user_id.into(),
            from_version,
        }
    }
}

/// Why the server chose full reconstruction over an incremental tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FullResyncReason {
    /// Client starts from empty state.
    InitialSync,
    /// Client claims a version the server has not reached.
    ClientAhead,
    /// Client is further behind than the catch-up window.
    ClientTooFarBehind,
    /// No retained log rows follow the client's version.
    LogPruned,
}

impl fmt::Display for FullResyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FullResyncReason::InitialSync => "initial sync",
            FullResyncReason::ClientAhead => "client ahead of server",
            FullResyncReason::ClientTooFarBehind => "client too far behind",
            FullResyncReason::LogPruned => "log pruned",
        };
        f.write_str(text)
    }
}

/// How a pull response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResyncMode {
    /// Tail of the operation log.
    Incremental,
    /// INSERT entries synthesized from current table state.
    Full(FullResyncReason),
}

impl ResyncMode {
    /// Returns true for full reconstruction.
    pub fn is_full(&self) -> bool {
        matches!(self, ResyncMode::Full(_))
    }
}

/// Changes to replay, ordered for deterministic application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Entries to replay in order.
    pub logs: Vec<LogEntry>,
    /// Baseline version to adopt after replaying.
    pub version: u64,
    /// How the entries were produced.
    pub mode: ResyncMode,
}

impl PullResponse {
    /// Creates a new pull response.
    pub fn new(logs: Vec<LogEntry>, version: u64, mode: ResyncMode) -> Self {
        Self {
            logs,
            version,
            mode,
        }
    }

    /// Returns an empty incremental response.
    pub fn empty(version: u64) -> Self {
        Self::new(Vec::new(), version, ResyncMode::Incremental)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use serde_json::json;

    #[test]
    fn push_request_accepts_client_field_names() {
        let request: PushRequest = serde_json::from_value(json!({
            "userId": "u1",
            "expectedServerDbVersion": 5,
            "logs": [{
                "table_": "daka",
                "operate": "INSERT",
                "recordId": "u1-20240101",
                "record": {"userId": "u1", "forLearningDate": "2024-01-01T00:00:00Z"}
            }]
        }))
        .unwrap();

        assert_eq!(request.expected_server_db_version, 5);
        assert_eq!(request.logs.len(), 1);
        assert_eq!(request.logs[0].operate, Operation::Insert);
    }

    #[test]
    fn push_response_shapes() {
        let ok = PushResponse::success(6);
        assert!(ok.is_success());
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"newVersion": 6}));

        let failed = PushResponse::failed(
            FailureKind::VersionConflict,
            "DB_VERSION_NOT_MATCH",
            "expected 5, server is at 6",
        );
        assert!(!failed.is_success());
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["failure"]["kind"], "VERSION_CONFLICT");
        assert!(failed.failure.unwrap().kind.is_resolvable_by_pull());
    }

    #[test]
    fn resync_mode_wire_shape() {
        let full = serde_json::to_value(ResyncMode::Full(FullResyncReason::LogPruned)).unwrap();
        assert_eq!(full, json!({"kind": "FULL", "reason": "LOG_PRUNED"}));

        let incremental = serde_json::to_value(ResyncMode::Incremental).unwrap();
        assert_eq!(incremental, json!({"kind": "INCREMENTAL"}));
        assert!(!ResyncMode::Incremental.is_full());
    }

    #[test]
    fn message_envelope() {
        let message = SyncMessage::PullRequest(PullRequest::new("u1", 3));
        let bytes = message.encode().unwrap();
        let decoded = SyncMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.type_code(), 3);
    }
}
