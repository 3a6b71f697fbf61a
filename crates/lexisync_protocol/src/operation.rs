//! Mutation kinds carried by log entries.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Kind of mutation a log entry describes.
///
/// On the wire this is the upper-case name (`"INSERT"`, `"UPDATE"`,
/// `"DELETE"`, `"BATCH_DELETE"`). Parsing is case-insensitive because older
/// clients send lower-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// A record was created.
    Insert,
    /// A record was modified (or created, if the server never saw it).
    Update,
    /// A single record was removed.
    Delete,
    /// All of the caller's records matching a filter were removed.
    BatchDelete,
}

impl Operation {
    /// All operations, in wire-code order.
    pub const ALL: [Operation; 4] = [
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::BatchDelete,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::BatchDelete => "BATCH_DELETE",
        }
    }

    /// Returns true if the payload is a full record rather than a filter.
    pub fn carries_record(&self) -> bool {
        !matches!(self, Operation::BatchDelete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            "BATCH_DELETE" => Ok(Operation::BatchDelete),
            _ => Err(ProtocolError::UnknownOperation(s.to_string())),
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
