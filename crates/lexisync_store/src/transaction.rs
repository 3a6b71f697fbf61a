//! Write transactions.

use crate::error::{StoreError, StoreResult};
use crate::ledger::RowGuard;
use crate::state::LogRecord;
use crate::store::Store;
use lexisync_protocol::LogEntry;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A pending row change.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Insert or replace a row.
    Put(Value),
    /// Remove a row.
    Delete,
}

/// An all-or-nothing unit of work against a [`Store`].
///
/// Rows, ledger versions and log entries written through the transaction are
/// buffered and become visible to other readers only on [`commit`]. Reads
/// through the transaction see its own pending writes.
///
/// Version rows locked with [`lock_and_get_version`] stay locked until the
/// transaction is committed, aborted or dropped. Dropping an active
/// transaction discards its writes.
///
/// [`commit`]: WriteTransaction::commit
/// [`lock_and_get_version`]: WriteTransaction::lock_and_get_version
pub struct WriteTransaction<'a> {
    store: &'a Store,
    state: TransactionState,
    /// (table, key) -> pending change.
    writes: HashMap<(String, String), PendingWrite>,
    /// Log entries in append order.
    log: Vec<LogEntry>,
    /// Pending ledger values.
    versions: HashMap<String, u64>,
    /// Held version-row locks.
    row_guards: HashMap<String, RowGuard>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            state: TransactionState::Active,
            writes: HashMap::new(),
            log: Vec::new(),
            versions: HashMap::new(),
            row_guards: HashMap::new(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Reads a row, seeing this transaction's own writes.
    pub fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        self.ensure_active()?;
        if let Some(write) = self.writes.get(&(table.to_string(), key.to_string())) {
            return Ok(match write {
                PendingWrite::Put(value) => Some(value.clone()),
                PendingWrite::Delete => None,
            });
        }
        Ok(self.store.state.read().row(table, key).cloned())
    }

    /// Returns true if the row exists.
    pub fn contains(&self, table: &str, key: &str) -> StoreResult<bool> {
        Ok(self.get(table, key)?.is_some())
    }

    /// Inserts or replaces a row.
    pub fn put(&mut self, table: &str, key: &str, value: Value) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(
            (table.to_string(), key.to_string()),
            PendingWrite::Put(value),
        );
        Ok(())
    }

    /// Removes a row. Returns true if it existed.
    pub fn delete(&mut self, table: &str, key: &str) -> StoreResult<bool> {
        let existed = self.contains(table, key)?;
        if existed {
            self.writes
                .insert((table.to_string(), key.to_string()), PendingWrite::Delete);
        }
        Ok(existed)
    }

    /// Returns the rows of `table` matching `filter`, ordered by key.
    pub fn scan<F>(&self, table: &str, filter: F) -> StoreResult<Vec<(String, Value)>>
    where
        F: Fn(&str, &Value) -> bool,
    {
        self.ensure_active()?;
        let mut rows: BTreeMap<String, Value> = self
            .store
            .state
            .read()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default();

        for ((write_table, key), write) in &self.writes {
            if write_table != table {
                continue;
            }
            match write {
                PendingWrite::Put(value) => {
                    rows.insert(key.clone(), value.clone());
                }
                PendingWrite::Delete => {
                    rows.remove(key);
                }
            }
        }

        Ok(rows
            .into_iter()
            .filter(|(key, value)| filter(key, value))
            .collect())
    }

    /// Acquires the exclusive lock on `user_id`'s version row and returns the
    /// current version, or `None` if the user has no ledger row.
    ///
    /// Blocks while another transaction holds the same row. Re-locking a row
    /// this transaction already holds does not block.
    pub fn lock_and_get_version(&mut self, user_id: &str) -> StoreResult<Option<u64>> {
        self.ensure_active()?;
        if !self.row_guards.contains_key(user_id) {
            let guard = self.store.row_locks.acquire(user_id);
            self.row_guards.insert(user_id.to_string(), guard);
        }
        Ok(self.version(user_id))
    }

    /// Returns the version as seen by this transaction.
    #[must_use]
    pub fn version(&self, user_id: &str) -> Option<u64> {
        if let Some(version) = self.versions.get(user_id) {
            return Some(*version);
        }
        self.store.state.read().versions.get(user_id).copied()
    }

    /// Sets the version to `new_version` only if it currently equals
    /// `expected`. Returns whether the swap happened.
    ///
    /// The caller must hold the row lock.
    pub fn cas_version(&mut self, user_id: &str, expected: u64, new_version: u64) -> StoreResult<bool> {
        self.ensure_active()?;
        if !self.row_guards.contains_key(user_id) {
            return Err(StoreError::lock_not_held(user_id));
        }
        if self.version(user_id) != Some(expected) {
            return Ok(false);
        }
        self.versions.insert(user_id.to_string(), new_version);
        Ok(true)
    }

    /// Appends an entry to the operation log.
    pub fn append_log(&mut self, entry: LogEntry) -> StoreResult<()> {
        self.ensure_active()?;
        self.log.push(entry);
        Ok(())
    }

    /// Returns the log entries appended so far.
    #[must_use]
    pub fn pending_log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Returns the number of pending row writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Applies every pending change atomically and releases held row locks.
    pub fn commit(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        {
            let mut state = self.store.state.write();
            for ((table, key), write) in self.writes.drain() {
                match write {
                    PendingWrite::Put(value) => {
                        state.tables.entry(table).or_default().insert(key, value);
                    }
                    PendingWrite::Delete => {
                        if let Some(rows) = state.tables.get_mut(&table) {
                            rows.remove(&key);
                        }
                    }
                }
            }
            for (user_id, version) in self.versions.drain() {
                state.versions.insert(user_id, version);
            }
            for entry in self.log.drain(..) {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.log.push(LogRecord { seq, entry });
            }
        }
        self.state = TransactionState::Committed;
        self.row_guards.clear();
        Ok(())
    }

    /// Discards every pending change and releases held row locks.
    pub fn abort(&mut self) -> StoreResult<()> {
        self.ensure_active()?;
        self.discard();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    fn discard(&mut self) {
        self.writes.clear();
        self.versions.clear();
        self.log.clear();
        self.row_guards.clear();
    }

    fn ensure_active(&self) -> StoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(StoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(StoreError::invalid_operation("transaction already aborted"))
            }
        }
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            debug!(
                pending_writes = self.writes.len(),
                pending_log = self.log.len(),
                "transaction dropped without commit, discarding"
            );
            self.discard();
        }
    }
}
