//! Per-table appliers.
//!
//! Each synchronizable table has one [`TableApplier`] that applies logged
//! mutations to it idempotently:
//!
//! - INSERT of an existing key succeeds without change
//! - UPDATE of a missing key creates it
//! - DELETE of a missing key is a no-op
//! - BATCH_DELETE is always scoped to the pushing user
//!
//! The [`ApplierRegistry`] maps table names to appliers, so the sync engine
//! never needs table-specific code.

mod activity;
mod dict;
mod entity;
mod filter;
mod learning;
mod user;

pub use activity::{Daka, UserCowDungLog, UserOper};
pub use dict::{Dict, DictWord};
pub use entity::{EntityApplier, SyncEntity};
pub(crate) use entity::str_field;
pub use learning::{LearningDict, LearningWord, MasteredWord, UserStudyStep, UserWrongWord};
pub use user::UserProfile;

use crate::error::ServerResult;
use lexisync_protocol::{tables, Operation};
use lexisync_store::{Store, WriteTransaction};
use serde_json::Value;
use std::collections::HashMap;

/// Reads a row by table and key.
pub type RowLookup<'a> = dyn Fn(&str, &str) -> Option<Value> + 'a;

/// Why an applier left the table unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// INSERT of a key that already exists.
    Duplicate,
    /// DELETE of a key that does not exist.
    Missing,
    /// The record belongs to someone else and the table ignores such records.
    Foreign,
}

/// Result of applying one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new row was written.
    Inserted,
    /// An existing row was replaced.
    Updated,
    /// UPDATE of a missing row created it.
    Upserted,
    /// A row was removed.
    Deleted,
    /// Rows removed by a BATCH_DELETE.
    BatchDeleted(usize),
    /// Nothing changed.
    Skipped(SkipReason),
}

/// Applies logged mutations to one table.
pub trait TableApplier: Send + Sync {
    /// Returns the table name.
    fn table(&self) -> &'static str;

    /// Returns true if the table accepts `operation`.
    fn supports(&self, operation: Operation) -> bool;

    /// Applies one mutation inside `txn` on behalf of `user_id`.
    ///
    /// `record_id` is the key as sent by the client. Record-carrying
    /// operations must name the same key their payload maps to, so the log
    /// and the stored row always agree.
    fn apply(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        operation: Operation,
        record_id: &str,
        payload: &Value,
    ) -> ServerResult<ApplyOutcome>;

    /// Returns the committed rows owned by `user_id`, ordered by key.
    fn snapshot(&self, store: &Store, user_id: &str) -> Vec<(String, Value)>;
}

/// Maps table names to appliers.
pub struct ApplierRegistry {
    appliers: HashMap<&'static str, Box<dyn TableApplier>>,
}

impl ApplierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            appliers: HashMap::new(),
        }
    }

    /// Creates a registry with an applier for every synchronizable table.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EntityApplier::<UserProfile>::new());
        registry.register(EntityApplier::<Dict>::new());
        registry.register(EntityApplier::<LearningDict>::new());
        registry.register(EntityApplier::<LearningWord>::new());
        registry.register(EntityApplier::<UserStudyStep>::new());
        registry.register(EntityApplier::<Daka>::new());
        registry.register(EntityApplier::<UserOper>::new());
        registry.register(EntityApplier::<UserWrongWord>::new());
        registry.register(EntityApplier::<DictWord>::new());
        registry.register(EntityApplier::<MasteredWord>::new());
        registry.register(EntityApplier::<UserCowDungLog>::new());
        registry
    }

    /// Registers an applier, replacing any previous one for the same table.
    pub fn register<A: TableApplier + 'static>(&mut self, applier: A) {
        self.appliers.insert(applier.table(), Box::new(applier));
    }

    /// Looks up the applier for a normalized table name.
    pub fn get(&self, table: &str) -> Option<&dyn TableApplier> {
        self.appliers.get(table).map(|a| a.as_ref())
    }

    /// Returns the registered appliers in full-reconstruction order.
    ///
    /// Tables outside the standard set follow in name order.
    pub fn ordered(&self) -> Vec<&dyn TableApplier> {
        let mut extra: Vec<&'static str> = self
            .appliers
            .keys()
            .copied()
            .filter(|t| !tables::is_known(t))
            .collect();
        extra.sort_unstable();

        tables::ALL
            .iter()
            .copied()
            .chain(extra)
            .filter_map(|t| self.get(t))
            .collect()
    }

    /// Returns the number of registered tables.
    pub fn len(&self) -> usize {
        self.appliers.len()
    }

    /// Returns true if no applier is registered.
    pub fn is_empty(&self) -> bool {
        self.appliers.is_empty()
    }
}

impl Default for ApplierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
