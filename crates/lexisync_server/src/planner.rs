//! Pull-sync planning.
//!
//! A pull is answered either with the tail of the operation log or, when the
//! tail cannot bring the client up to date, with a full reconstruction of the
//! user's current rows.

use crate::appliers::ApplierRegistry;
use chrono::Utc;
use lexisync_protocol::{tables, FullResyncReason, LogEntry, Operation, PullResponse, ResyncMode};
use lexisync_store::{LogRecord, Store};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Decides how to answer a pull from `from_version` at `current_version`.
///
/// `pruned_before` is the user's log pruning watermark and `has_log_after`
/// reports whether any log row with a version above its argument is retained.
/// A client already at `current_version` has no rows after it, so it gets a
/// full reconstruction too.
pub fn choose_mode<F>(
    from_version: u64,
    current_version: u64,
    window: u64,
    pruned_before: u64,
    has_log_after: F,
) -> ResyncMode
where
    F: FnOnce(u64) -> bool,
{
    if from_version == 0 {
        return ResyncMode::Full(FullResyncReason::InitialSync);
    }
    if from_version > current_version {
        return ResyncMode::Full(FullResyncReason::ClientAhead);
    }
    if current_version > from_version.saturating_add(window) {
        return ResyncMode::Full(FullResyncReason::ClientTooFarBehind);
    }
    if from_version + 1 < pruned_before || !has_log_after(from_version) {
        return ResyncMode::Full(FullResyncReason::LogPruned);
    }
    ResyncMode::Incremental
}

/// Builds pull responses from committed state. Takes no locks beyond the
/// store's brief read locks.
pub struct ResyncPlanner {
    store: Arc<Store>,
    appliers: Arc<ApplierRegistry>,
    window: u64,
}

impl ResyncPlanner {
    /// Creates a planner with the given catch-up window.
    pub fn new(store: Arc<Store>, appliers: Arc<ApplierRegistry>, window: u64) -> Self {
        Self {
            store,
            appliers,
            window,
        }
    }

    /// Answers a pull for `user_id` from `from_version`.
    pub fn pull(&self, user_id: &str, from_version: u64) -> PullResponse {
        if self.store.get(tables::USER, user_id).is_none() {
            debug!(user_id, "pull for unknown user");
            return PullResponse::empty(0);
        }

        let current = self.store.version(user_id).unwrap_or(0);
        let mode = choose_mode(
            from_version,
            current,
            self.window,
            self.store.pruned_before(user_id),
            |from| self.store.has_log_after(user_id, from),
        );

        let logs = match mode {
            ResyncMode::Incremental => self.incremental(user_id, from_version, current),
            ResyncMode::Full(reason) => {
                info!(user_id, from_version, current, %reason, "full resync");
                self.full(user_id, current)
            }
        };
        debug!(user_id, from_version, current, entries = logs.len(), ?mode, "pull planned");
        PullResponse::new(logs, current, mode)
    }

    /// Log rows in `(from_version, current]`, collapsed to the latest entry
    /// per record.
    fn incremental(&self, user_id: &str, from_version: u64, current: u64) -> Vec<LogEntry> {
        let records: Vec<LogRecord> = self
            .store
            .log_since(user_id, from_version)
            .into_iter()
            .filter(|r| r.entry.version <= current)
            .collect();
        collapse(records)
    }

    /// One INSERT per current row, stamped with `current`.
    fn full(&self, user_id: &str, current: u64) -> Vec<LogEntry> {
        let now = Utc::now();
        self.appliers
            .ordered()
            .into_iter()
            .flat_map(|applier| {
                let table = applier.table();
                applier
                    .snapshot(&self.store, user_id)
                    .into_iter()
                    .map(move |(key, row)| {
                        LogEntry::new(
                            user_id,
                            current,
                            table,
                            Operation::Insert,
                            key,
                            row.to_string(),
                            now,
                            now,
                        )
                    })
            })
            .collect()
    }
}

/// Keeps the newest entry per `(table, record_id)` and orders the survivors
/// by `(version, create_time, seq)`.
///
/// BATCH_DELETE entries address a filter, not a record, so they are never
/// merged with each other or with record entries.
pub(crate) fn collapse(records: Vec<LogRecord>) -> Vec<LogEntry> {
    let mut latest: HashMap<(String, String), LogRecord> = HashMap::new();
    let mut kept: Vec<LogRecord> = Vec::new();

    for record in records {
        if !record.entry.operate.carries_record() {
            kept.push(record);
            continue;
        }
        let key = (record.entry.table.clone(), record.entry.record_id.clone());
        let newer = latest.get(&key).map_or(true, |seen| {
            (seen.entry.create_time, seen.seq) < (record.entry.create_time, record.seq)
        });
        if newer {
            latest.insert(key, record);
        }
    }

    kept.extend(latest.into_values());
    kept.sort_by_key(|r| (r.entry.version, r.entry.create_time, r.seq));
    kept.into_iter().map(|r| r.entry).collect()
}
