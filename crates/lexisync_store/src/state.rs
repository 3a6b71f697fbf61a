//! Committed store state and its snapshot format.

use crate::diagnostics::DiagnosticIssue;
use lexisync_protocol::LogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rows of one table, keyed by record key.
pub type TableRows = BTreeMap<String, Value>;

/// An operation log entry together with its store-assigned append sequence.
///
/// The sequence is strictly increasing across the whole store, so it orders
/// entries that share a version and a create time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Append sequence.
    pub seq: u64,
    /// The logged mutation.
    pub entry: LogEntry,
}

/// Everything the store has committed. This is also the snapshot file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoreState {
    /// Entity tables by name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableRows>,
    /// Version ledger: user id to version.
    #[serde(default)]
    pub versions: BTreeMap<String, u64>,
    /// Operation log in append order.
    #[serde(default)]
    pub log: Vec<LogRecord>,
    /// Per user, the version below which log records have been pruned.
    #[serde(default)]
    pub pruned_before: BTreeMap<String, u64>,
    /// Recorded integrity problems.
    #[serde(default)]
    pub issues: Vec<DiagnosticIssue>,
    /// Next append sequence.
    #[serde(default = "first_seq")]
    pub next_seq: u64,
}

fn first_seq() -> u64 {
    1
}

impl StoreState {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: first_seq(),
            ..Self::default()
        }
    }

    pub(crate) fn row(&self, table: &str, key: &str) -> Option<&Value> {
        self.tables.get(table).and_then(|rows| rows.get(key))
    }

    pub(crate) fn log_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a LogRecord> {
        self.log.iter().filter(move |r| r.entry.user_id == user_id)
    }
}
