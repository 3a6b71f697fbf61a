//! Per-user row locks guarding the version ledger.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

/// Exclusive hold on one user's version row.
///
/// Released when dropped.
pub type RowGuard = ArcMutexGuard<RawMutex, ()>;

/// Lazily created exclusive locks, one per user id.
///
/// Two holders of the same user's lock serialize; different users never
/// contend beyond the brief lookup in the lock table.
#[derive(Debug, Default)]
pub(crate) struct RowLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RowLocks {
    /// Blocks until the lock for `user_id` is acquired.
    pub(crate) fn acquire(&self, user_id: &str) -> RowGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_arc()
    }

    /// Acquires the lock for `user_id` if it is free.
    pub(crate) fn try_acquire(&self, user_id: &str) -> Option<RowGuard> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.try_lock_arc()
    }
}
