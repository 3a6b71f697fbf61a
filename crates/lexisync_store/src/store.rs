//! The store handle.

use crate::diagnostics::DiagnosticIssue;
use crate::error::{StoreError, StoreResult};
use crate::ledger::RowLocks;
use crate::state::{LogRecord, StoreState};
use crate::transaction::WriteTransaction;
use parking_lot::RwLock;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Transactional row store with a version ledger and an operation log.
///
/// All state lives in memory. A store opened from a path can be saved back
/// to it as a JSON snapshot.
///
/// ## Concurrency
///
/// Readers take a brief shared lock on committed state and never wait on
/// writers for longer than one commit. Writers serialize per user only
/// through version-row locks (see [`WriteTransaction::lock_and_get_version`]).
pub struct Store {
    pub(crate) state: RwLock<StoreState>,
    pub(crate) row_locks: RowLocks,
    path: Option<PathBuf>,
}

impl Store {
    /// Creates an empty store with no backing file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::new()),
            row_locks: RowLocks::default(),
            path: None,
        }
    }

    /// Opens the snapshot at `path`, or starts empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let bytes = fs::read(&path)?;
            let state: StoreState = serde_json::from_slice(&bytes)?;
            info!(
                path = %path.display(),
                users = state.versions.len(),
                log_entries = state.log.len(),
                "opened store snapshot"
            );
            state
        } else {
            debug!(path = %path.display(), "no snapshot found, starting empty");
            StoreState::new()
        };
        Ok(Self {
            state: RwLock::new(state),
            row_locks: RowLocks::default(),
            path: Some(path),
        })
    }

    /// Returns the snapshot path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes committed state to the snapshot path.
    pub fn save(&self) -> StoreResult<()> {
        let path = self.path.as_ref().ok_or(StoreError::NoSnapshotPath)?;
        self.save_to(path)
    }

    /// Writes committed state to `path`, replacing it atomically.
    pub fn save_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(&*self.state.read())?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "saved store snapshot");
        Ok(())
    }

    /// Begins a write transaction.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(self)
    }

    // === Rows ===

    /// Reads a committed row.
    #[must_use]
    pub fn get(&self, table: &str, key: &str) -> Option<Value> {
        self.state.read().row(table, key).cloned()
    }

    /// Returns committed rows of `table` matching `filter`, ordered by key.
    pub fn scan<F>(&self, table: &str, filter: F) -> Vec<(String, Value)>
    where
        F: Fn(&str, &Value) -> bool,
    {
        // Filters may read other rows, so run them outside the lock.
        let rows = self.state.read().tables.get(table).cloned().unwrap_or_default();
        rows.into_iter()
            .filter(|(key, value)| filter(key, value))
            .collect()
    }

    /// Returns the number of committed rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, |rows| rows.len())
    }

    // === Version ledger ===

    /// Creates a version row at 0 for `user_id` if absent. Returns true if created.
    ///
    /// Takes effect immediately, outside any transaction.
    pub fn ensure_version_row(&self, user_id: &str) -> bool {
        let mut state = self.state.write();
        if state.versions.contains_key(user_id) {
            return false;
        }
        state.versions.insert(user_id.to_string(), 0);
        debug!(user_id, "created version row");
        true
    }

    /// Returns the committed version for `user_id`.
    #[must_use]
    pub fn version(&self, user_id: &str) -> Option<u64> {
        self.state.read().versions.get(user_id).copied()
    }

    #[cfg(test)]
    pub(crate) fn is_version_row_free(&self, user_id: &str) -> bool {
        self.row_locks.try_acquire(user_id).is_some()
    }

    // === Operation log ===

    /// Returns every committed log record of `user_id` in append order.
    #[must_use]
    pub fn log_for(&self, user_id: &str) -> Vec<LogRecord> {
        self.state.read().log_for(user_id).cloned().collect()
    }

    /// Returns the committed log records of `user_id` with `version > from_version`,
    /// in append order.
    #[must_use]
    pub fn log_since(&self, user_id: &str, from_version: u64) -> Vec<LogRecord> {
        self.state
            .read()
            .log_for(user_id)
            .filter(|r| r.entry.version > from_version)
            .cloned()
            .collect()
    }

    /// Returns true if any log record of `user_id` has `version > from_version`.
    #[must_use]
    pub fn has_log_after(&self, user_id: &str, from_version: u64) -> bool {
        self.state
            .read()
            .log_for(user_id)
            .any(|r| r.entry.version > from_version)
    }

    /// Removes log records of `user_id` with `version < before_version`.
    /// Returns the number removed.
    ///
    /// Also raises the user's pruning watermark (see [`Store::pruned_before`]).
    pub fn prune_log(&self, user_id: &str, before_version: u64) -> usize {
        let removed =
            self.remove_log(|r| r.entry.user_id == user_id && r.entry.version < before_version);
        {
            let mut state = self.state.write();
            let mark = state.pruned_before.entry(user_id.to_string()).or_insert(0);
            *mark = (*mark).max(before_version);
        }
        info!(user_id, before_version, removed, "pruned operation log");
        removed
    }

    /// Returns the version below which `user_id`'s log may be incomplete.
    ///
    /// 0 if the log was never pruned.
    #[must_use]
    pub fn pruned_before(&self, user_id: &str) -> u64 {
        self.state
            .read()
            .pruned_before
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    /// Counts log records of `user_id` whose version is beyond the ledger.
    ///
    /// Such rows can only appear after manual intervention on the ledger.
    #[must_use]
    pub fn orphaned_log_count(&self, user_id: &str) -> usize {
        let state = self.state.read();
        let current = state.versions.get(user_id).copied().unwrap_or(0);
        state
            .log_for(user_id)
            .filter(|r| r.entry.version > current)
            .count()
    }

    /// Removes log records of `user_id` whose version is beyond the ledger.
    /// Returns the number removed.
    pub fn delete_orphaned_logs(&self, user_id: &str) -> usize {
        let current = self.version(user_id).unwrap_or(0);
        let removed =
            self.remove_log(|r| r.entry.user_id == user_id && r.entry.version > current);
        info!(user_id, current, removed, "deleted orphaned log entries");
        removed
    }

    fn remove_log<F>(&self, doomed: F) -> usize
    where
        F: Fn(&LogRecord) -> bool,
    {
        let mut state = self.state.write();
        let before = state.log.len();
        state.log.retain(|r| !doomed(r));
        before - state.log.len()
    }

    // === Diagnostics ===

    /// Records an issue in its own committed write, independent of any
    /// open transaction.
    pub fn record_issue(&self, issue: DiagnosticIssue) {
        debug!(user_id = %issue.user_id, issue_type = %issue.issue_type, "recording issue");
        self.state.write().issues.push(issue);
    }

    /// Returns the issues recorded for `user_id`, oldest first.
    #[must_use]
    pub fn issues(&self, user_id: &str) -> Vec<DiagnosticIssue> {
        self.state
            .read()
            .issues
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("tables", &state.tables.len())
            .field("users", &state.versions.len())
            .field("log_entries", &state.log.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexisync_protocol::{LogEntry, Operation};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn append(store: &Store, user: &str, version: u64, key: &str) {
        let now = Utc::now();
        let mut txn = store.begin_write();
        txn.append_log(LogEntry::new(user, version, "daka", Operation::Insert, key, "{}", now, now))
            .unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn ensure_version_row_is_idempotent() {
        let store = Store::in_memory();
        assert!(store.ensure_version_row("u1"));
        assert!(!store.ensure_version_row("u1"));
        assert_eq!(store.version("u1"), Some(0));
        assert_eq!(store.version("u2"), None);
    }

    #[test]
    fn log_queries_filter_by_user_and_version() {
        let store = Store::in_memory();
        append(&store, "u1", 1, "a");
        append(&store, "u2", 1, "x");
        append(&store, "u1", 2, "b");
        append(&store, "u1", 3, "c");

        let since: Vec<_> = store
            .log_since("u1", 1)
            .into_iter()
            .map(|r| r.entry.record_id)
            .collect();
        assert_eq!(since, vec!["b", "c"]);
        assert!(store.has_log_after("u1", 2));
        assert!(!store.has_log_after("u1", 3));
        assert_eq!(store.log_for("u2").len(), 1);
    }

    #[test]
    fn prune_removes_older_versions_only() {
        let store = Store::in_memory();
        append(&store, "u1", 1, "a");
        append(&store, "u1", 2, "b");
        append(&store, "u2", 1, "x");

        assert_eq!(store.prune_log("u1", 2), 1);
        assert_eq!(store.log_for("u1").len(), 1);
        assert_eq!(store.log_for("u2").len(), 1);
        assert_eq!(store.pruned_before("u1"), 2);
        assert_eq!(store.pruned_before("u2"), 0);

        // The watermark never moves backwards.
        assert_eq!(store.prune_log("u1", 1), 0);
        assert_eq!(store.pruned_before("u1"), 2);
    }

    #[test]
    fn orphaned_logs_are_beyond_ledger() {
        let store = Store::in_memory();
        store.ensure_version_row("u1");
        append(&store, "u1", 0, "kept");
        append(&store, "u1", 4, "orphan");

        assert_eq!(store.orphaned_log_count("u1"), 1);
        assert_eq!(store.delete_orphaned_logs("u1"), 1);
        assert_eq!(store.orphaned_log_count("u1"), 0);
        assert_eq!(store.log_for("u1").len(), 1);
    }

    #[test]
    fn issues_survive_aborted_transaction() {
        let store = Store::in_memory();
        let mut txn = store.begin_write();
        txn.put("dict_word", "d1-w1", json!({})).unwrap();
        store.record_issue(DiagnosticIssue::new("u1", "RAW_WORD_ORDER_INVALID", "gap at 2"));
        txn.abort().unwrap();

        assert_eq!(store.issues("u1").len(), 1);
        assert!(store.issues("u2").is_empty());
        assert_eq!(store.row_count("dict_word"), 0);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = Store::open(&path).unwrap();
        store.ensure_version_row("u1");
        let mut txn = store.begin_write();
        txn.put("user", "u1", json!({"id": "u1"})).unwrap();
        txn.lock_and_get_version("u1").unwrap();
        txn.cas_version("u1", 0, 1).unwrap();
        txn.commit().unwrap();
        append(&store, "u1", 1, "a");
        store.save().unwrap();

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.version("u1"), Some(1));
        assert_eq!(reopened.get("user", "u1"), Some(json!({"id": "u1"})));
        assert_eq!(reopened.log_for("u1").len(), 1);

        // Sequence numbering continues after reopen.
        append(&reopened, "u1", 2, "b");
        let log = reopened.log_for("u1");
        assert!(log[1].seq > log[0].seq);
    }

    #[test]
    fn in_memory_store_cannot_save() {
        let store = Store::in_memory();
        assert!(matches!(store.save(), Err(StoreError::NoSnapshotPath)));
    }

    #[test]
    fn same_user_transactions_serialize() {
        let store = Arc::new(Store::in_memory());
        store.ensure_version_row("u1");

        let mut first = store.begin_write();
        assert_eq!(first.lock_and_get_version("u1").unwrap(), Some(0));

        let contender = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut txn = store.begin_write();
                let seen = txn.lock_and_get_version("u1").unwrap();
                txn.commit().unwrap();
                seen
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(first.cas_version("u1", 0, 1).unwrap());
        first.commit().unwrap();

        // The contender could only read after the first commit.
        assert_eq!(contender.join().unwrap(), Some(1));
    }
}
