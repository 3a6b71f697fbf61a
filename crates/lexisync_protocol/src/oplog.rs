//! Log entry shapes exchanged by push and pull.

use crate::error::{ProtocolError, ProtocolResult};
use crate::operation::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A mutation recorded on a client and pushed to the server.
///
/// `record` holds JSON text: the full record for INSERT/UPDATE/DELETE, or a
/// flat key/value filter for BATCH_DELETE. Clients may send it either as a
/// JSON-encoded string or inline as an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLog {
    /// Target table.
    #[serde(alias = "table_", alias = "tblName")]
    pub table: String,
    /// Mutation kind.
    pub operate: Operation,
    /// Record key as encoded by the client.
    pub record_id: String,
    /// Record or filter, as JSON text.
    #[serde(default, deserialize_with = "record_text")]
    pub record: String,
    /// Client-side creation time of the log row.
    #[serde(
        default,
        deserialize_with = "crate::time::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub create_time: Option<DateTime<Utc>>,
    /// Client-side update time of the log row.
    #[serde(
        default,
        deserialize_with = "crate::time::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_time: Option<DateTime<Utc>>,
}

impl ClientLog {
    /// Creates a client log from any serializable record or filter.
    pub fn new(
        table: impl Into<String>,
        operate: Operation,
        record_id: impl Into<String>,
        record: &impl Serialize,
    ) -> ProtocolResult<Self> {
        Ok(Self {
            table: table.into(),
            operate,
            record_id: record_id.into(),
            record: serde_json::to_string(record)?,
            create_time: None,
            update_time: None,
        })
    }

    /// Parses the record text as JSON.
    pub fn record_value(&self) -> ProtocolResult<Value> {
        parse_record(&self.record)
    }
}

/// A mutation as stored in the server operation log and served on pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique entry id.
    pub id: String,
    /// Owner of the entry.
    pub user_id: String,
    /// Ledger version produced by the push that wrote this entry.
    pub version: u64,
    /// Target table.
    #[serde(alias = "table_", alias = "tblName")]
    pub table: String,
    /// Mutation kind.
    pub operate: Operation,
    /// Record key.
    pub record_id: String,
    /// Record or filter, as JSON text.
    #[serde(default, deserialize_with = "record_text")]
    pub record: String,
    /// Time the entry was written.
    pub create_time: DateTime<Utc>,
    /// Time the entry was last touched (equal to `create_time`; entries are never mutated).
    pub update_time: DateTime<Utc>,
}

impl LogEntry {
    /// Creates a new entry with a fresh id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        version: u64,
        table: impl Into<String>,
        operate: Operation,
        record_id: impl Into<String>,
        record: impl Into<String>,
        create_time: DateTime<Utc>,
        update_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.into(),
            version,
            table: table.into(),
            operate,
            record_id: record_id.into(),
            record: record.into(),
            create_time,
            update_time,
        }
    }

    /// Creates the server-side entry for an applied client mutation.
    pub fn from_client(
        user_id: impl Into<String>,
        version: u64,
        table: impl Into<String>,
        log: &ClientLog,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            user_id,
            version,
            table,
            log.operate,
            log.record_id.clone(),
            log.record.clone(),
            now,
            now,
        )
    }

    /// Returns the `(table, record_id)` pair this entry targets.
    pub fn target(&self) -> (&str, &str) {
        (&self.table, &self.record_id)
    }

    /// Parses the record text as JSON.
    pub fn record_value(&self) -> ProtocolResult<Value> {
        parse_record(&self.record)
    }

    /// Converts the entry back into the push shape, for replay.
    pub fn to_client_log(&self) -> ClientLog {
        ClientLog {
            table: self.table.clone(),
            operate: self.operate,
            record_id: self.record_id.clone(),
            record: self.record.clone(),
            create_time: Some(self.create_time),
            update_time: Some(self.update_time),
        }
    }
}

fn parse_record(text: &str) -> ProtocolResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(text)?)
}

/// Accepts `record` as a JSON string, an inline object, or null.
fn record_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        value @ Value::Object(_) => Ok(value.to_string()),
        _ => Err(serde::de::Error::custom(ProtocolError::InvalidRecord)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_accepts_string_or_object() {
        let as_string: ClientLog = serde_json::from_value(json!({
            "table_": "daka",
            "operate": "insert",
            "recordId": "u1-20240101",
            "record": "{\"userId\":\"u1\"}"
        }))
        .unwrap();
        let as_object: ClientLog = serde_json::from_value(json!({
            "table": "daka",
            "operate": "INSERT",
            "recordId": "u1-20240101",
            "record": {"userId": "u1"}
        }))
        .unwrap();

        assert_eq!(as_string.operate, Operation::Insert);
        assert_eq!(as_string.table, "daka");
        assert_eq!(
            as_string.record_value().unwrap(),
            as_object.record_value().unwrap()
        );
    }

    #[test]
    fn record_rejects_scalars() {
        let result: Result<ClientLog, _> = serde_json::from_value(json!({
            "table": "daka",
            "operate": "INSERT",
            "recordId": "x",
            "record": 42
        }));
        assert!(result.is_err());
    }

    #[test]
    fn empty_record_parses_as_empty_object() {
        let log = ClientLog {
            table: "learning_word".into(),
            operate: Operation::BatchDelete,
            record_id: "x".into(),
            record: String::new(),
            create_time: None,
            update_time: None,
        };
        assert_eq!(log.record_value().unwrap(), json!({}));
    }

    #[test]
    fn entry_from_client_copies_mutation() {
        let log = ClientLog::new("daka", Operation::Insert, "u1-20240101", &json!({"a": 1})).unwrap();
        let now = Utc::now();
        let entry = LogEntry::from_client("u1", 6, "daka", &log, now);

        assert_eq!(entry.version, 6);
        assert_eq!(entry.target(), ("daka", "u1-20240101"));
        assert_eq!(entry.create_time, now);
        assert_eq!(entry.id.len(), 32);
        assert_eq!(entry.to_client_log().record, log.record);
    }

    #[test]
    fn entry_wire_shape_is_camel_case() {
        let entry = LogEntry::new(
            "u1",
            1,
            "daka",
            Operation::Delete,
            "u1-20240101",
            "{}",
            Utc::now(),
            Utc::now(),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("recordId").is_some());
        assert!(value.get("userId").is_some());
        assert_eq!(value["operate"], "DELETE");
    }
}
