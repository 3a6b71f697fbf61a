//! Generic applier over a typed record.

use super::filter::Filter;
use super::{ApplyOutcome, RowLookup, SkipReason, TableApplier};
use crate::error::{ServerError, ServerResult};
use lexisync_protocol::Operation;
use lexisync_store::{Store, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{debug, info};

/// A record type stored in one synchronizable table.
///
/// The associated constants describe the table's policy; the applier reads
/// them instead of branching on table names.
pub trait SyncEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Operations the table accepts.
    const OPERATIONS: &'static [Operation];

    /// Keys a BATCH_DELETE filter may use.
    const FILTER_KEYS: &'static [&'static str] = &[];

    /// Keys a BATCH_DELETE filter must use.
    const REQUIRED_FILTER_KEYS: &'static [&'static str] = &[];

    /// Whether INSERT of an existing key replaces the row.
    const INSERT_UPSERTS: bool = false;

    /// Whether records owned by another user are skipped instead of rejected.
    const SKIP_FOREIGN: bool = false;

    /// Returns the storage key of this record.
    fn record_key(&self) -> String;

    /// Returns true if the stored row belongs to `user_id`.
    fn owned_by(row: &Value, user_id: &str, _lookup: &RowLookup<'_>) -> bool {
        str_field(row, "userId") == Some(user_id)
    }
}

/// Returns a string field of a row.
pub(crate) fn str_field<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// [`TableApplier`] for any [`SyncEntity`].
pub struct EntityApplier<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: SyncEntity> EntityApplier<E> {
    /// Creates the applier.
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    fn decode(payload: &Value) -> ServerResult<E> {
        serde_json::from_value(payload.clone()).map_err(|e| ServerError::invalid_payload(E::TABLE, e))
    }

    fn owns(txn: &WriteTransaction<'_>, row: &Value, user_id: &str) -> bool {
        let lookup = |table: &str, key: &str| txn.get(table, key).ok().flatten();
        E::owned_by(row, user_id, &lookup)
    }

    fn foreign(user_id: &str, key: &str) -> ServerResult<ApplyOutcome> {
        if E::SKIP_FOREIGN {
            info!(user_id, table = E::TABLE, record_id = key, "record owned by another user, skipping");
            Ok(ApplyOutcome::Skipped(SkipReason::Foreign))
        } else {
            Err(ServerError::ownership(E::TABLE, user_id))
        }
    }

    /// The log and the row must name the record the same way.
    fn check_key(record_id: &str, key: &str) -> ServerResult<()> {
        if record_id == key {
            Ok(())
        } else {
            Err(ServerError::record_id_mismatch(E::TABLE, record_id, key))
        }
    }

    fn write(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        operation: Operation,
        record_id: &str,
        payload: &Value,
    ) -> ServerResult<ApplyOutcome> {
        let entity = Self::decode(payload)?;
        let key = entity.record_key();
        Self::check_key(record_id, &key)?;
        let row = serde_json::to_value(&entity)?;

        if !Self::owns(txn, &row, user_id) {
            return Self::foreign(user_id, &key);
        }

        let outcome = match txn.get(E::TABLE, &key)? {
            Some(_) if operation == Operation::Insert && !E::INSERT_UPSERTS => {
                debug!(user_id, table = E::TABLE, record_id = %key, "record exists, skipping insert");
                return Ok(ApplyOutcome::Skipped(SkipReason::Duplicate));
            }
            Some(existing) => {
                if !Self::owns(txn, &existing, user_id) {
                    return Self::foreign(user_id, &key);
                }
                ApplyOutcome::Updated
            }
            None if operation == Operation::Update => {
                debug!(user_id, table = E::TABLE, record_id = %key, "update of missing record, creating");
                ApplyOutcome::Upserted
            }
            None => ApplyOutcome::Inserted,
        };

        txn.put(E::TABLE, &key, row)?;
        Ok(outcome)
    }

    fn delete(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        record_id: &str,
        payload: &Value,
    ) -> ServerResult<ApplyOutcome> {
        if payload.as_object().is_some_and(|o| !o.is_empty()) {
            Self::check_key(record_id, &Self::decode(payload)?.record_key())?;
        }

        let Some(existing) = txn.get(E::TABLE, record_id)? else {
            debug!(user_id, table = E::TABLE, record_id, "record already absent");
            return Ok(ApplyOutcome::Skipped(SkipReason::Missing));
        };
        if !Self::owns(txn, &existing, user_id) {
            return Self::foreign(user_id, record_id);
        }

        txn.delete(E::TABLE, record_id)?;
        Ok(ApplyOutcome::Deleted)
    }

    fn batch_delete(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        payload: &Value,
    ) -> ServerResult<ApplyOutcome> {
        let filter = Filter::parse(E::TABLE, payload, E::FILTER_KEYS, E::REQUIRED_FILTER_KEYS)?;

        let doomed = {
            let snapshot = &*txn;
            snapshot.scan(E::TABLE, |_, row| {
                filter.matches(row) && Self::owns(snapshot, row, user_id)
            })?
        };

        for (key, _) in &doomed {
            txn.delete(E::TABLE, key)?;
        }

        info!(user_id, table = E::TABLE, removed = doomed.len(), "batch delete applied");
        Ok(ApplyOutcome::BatchDeleted(doomed.len()))
    }
}

impl<E: SyncEntity> Default for EntityApplier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: SyncEntity> TableApplier for EntityApplier<E> {
    fn table(&self) -> &'static str {
        E::TABLE
    }

    fn supports(&self, operation: Operation) -> bool {
        E::OPERATIONS.contains(&operation)
    }

    fn apply(
        &self,
        txn: &mut WriteTransaction<'_>,
        user_id: &str,
        operation: Operation,
        record_id: &str,
        payload: &Value,
    ) -> ServerResult<ApplyOutcome> {
        if !self.supports(operation) {
            return Err(ServerError::unsupported(E::TABLE, operation));
        }
        match operation {
            Operation::Insert | Operation::Update => {
                self.write(txn, user_id, operation, record_id, payload)
            }
            Operation::Delete => self.delete(txn, user_id, record_id, payload),
            Operation::BatchDelete => self.batch_delete(txn, user_id, payload),
        }
    }

    fn snapshot(&self, store: &Store, user_id: &str) -> Vec<(String, Value)> {
        let lookup = |table: &str, key: &str| store.get(table, key);
        store.scan(E::TABLE, |_, row| E::owned_by(row, user_id, &lookup))
    }
}
