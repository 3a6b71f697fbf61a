//! User-owned dictionaries and their word lists.

use super::entity::{str_field, SyncEntity};
use super::RowLookup;
use chrono::{DateTime, Utc};
use lexisync_protocol::{tables, time, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dictionary owned by a user. Key: own id.
///
/// Only the owner's dictionaries are synchronized; records for anyone else's
/// dictionary are skipped. INSERT and UPDATE both replace the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dict {
    /// Dictionary id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: String,
    /// Whether other users may study it.
    pub is_shared: Option<bool>,
    /// Whether the word list is complete.
    pub is_ready: Option<bool>,
    /// Whether it is listed.
    pub visible: Option<bool>,
    /// Number of words.
    pub word_count: Option<i32>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for Dict {
    const TABLE: &'static str = tables::DICT;
    const OPERATIONS: &'static [Operation] = &[Operation::Insert, Operation::Update];
    const INSERT_UPSERTS: bool = true;
    const SKIP_FOREIGN: bool = true;

    fn record_key(&self) -> String {
        self.id.clone()
    }

    fn owned_by(row: &Value, user_id: &str, _lookup: &RowLookup<'_>) -> bool {
        str_field(row, "ownerId") == Some(user_id)
    }
}

/// Membership of a word in a dictionary, at position `seq`. Key: `dictId-wordId`.
///
/// Belongs to whoever owns the dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictWord {
    /// Dictionary.
    pub dict_id: String,
    /// Word.
    pub word_id: String,
    /// 1-based position in the dictionary.
    pub seq: i32,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for DictWord {
    const TABLE: &'static str = tables::DICT_WORD;
    const OPERATIONS: &'static [Operation] = &Operation::ALL;
    const FILTER_KEYS: &'static [&'static str] = &["dictId"];
    const REQUIRED_FILTER_KEYS: &'static [&'static str] = &["dictId"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.dict_id, self.word_id)
    }

    fn owned_by(row: &Value, user_id: &str, lookup: &RowLookup<'_>) -> bool {
        str_field(row, "dictId")
            .and_then(|dict_id| lookup(tables::DICT, dict_id))
            .is_some_and(|dict| Dict::owned_by(&dict, user_id, lookup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appliers::{ApplyOutcome, EntityApplier, SkipReason, TableApplier};
    use crate::error::ServerError;
    use lexisync_store::Store;
    use serde_json::json;

    fn dict(id: &str, owner: &str) -> Value {
        json!({"id": id, "name": "生词本", "ownerId": owner, "wordCount": 0})
    }

    fn member(dict_id: &str, word_id: &str, seq: i32) -> Value {
        json!({"dictId": dict_id, "wordId": word_id, "seq": seq})
    }

    fn seeded() -> Store {
        let store = Store::in_memory();
        let mut txn = store.begin_write();
        txn.put(tables::DICT, "d1", dict("d1", "u1")).unwrap();
        txn.put(tables::DICT, "d2", dict("d2", "u2")).unwrap();
        txn.put(tables::DICT_WORD, "d1-w1", member("d1", "w1", 1)).unwrap();
        txn.put(tables::DICT_WORD, "d2-w1", member("d2", "w1", 1)).unwrap();
        txn.commit().unwrap();
        drop(txn);
        store
    }

    #[test]
    fn dict_insert_upserts() {
        let store = seeded();
        let applier = EntityApplier::<Dict>::new();
        let mut txn = store.begin_write();
        let mut renamed = dict("d1", "u1");
        renamed["wordCount"] = json!(7);

        let outcome = applier
            .apply(&mut txn, "u1", Operation::Insert, "d1", &renamed)
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Updated);
        txn.commit().unwrap();
        assert_eq!(store.get(tables::DICT, "d1").unwrap()["wordCount"], 7);
    }

    #[test]
    fn foreign_dict_is_skipped() {
        let store = seeded();
        let applier = EntityApplier::<Dict>::new();
        let mut txn = store.begin_write();

        let outcome = applier
            .apply(&mut txn, "u1", Operation::Update, "d2", &dict("d2", "u2"))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::Foreign));

        // Claiming someone else's dictionary is also skipped.
        let outcome = applier
            .apply(&mut txn, "u1", Operation::Update, "d2", &dict("d2", "u1"))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Skipped(SkipReason::Foreign));
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn membership_follows_dict_owner() {
        let store = seeded();
        let applier = EntityApplier::<DictWord>::new();
        let mut txn = store.begin_write();

        let ok = applier.apply(&mut txn, "u1", Operation::Insert, "d1-w2", &member("d1", "w2", 2));
        assert_eq!(ok.unwrap(), ApplyOutcome::Inserted);

        let denied = applier.apply(&mut txn, "u1", Operation::Insert, "d2-w2", &member("d2", "w2", 2));
        assert!(matches!(denied, Err(ServerError::OwnershipMismatch { .. })));
    }

    #[test]
    fn membership_sees_dict_created_in_same_transaction() {
        let store = Store::in_memory();
        let mut txn = store.begin_write();
        EntityApplier::<Dict>::new()
            .apply(&mut txn, "u1", Operation::Insert, "d9", &dict("d9", "u1"))
            .unwrap();
        let outcome = EntityApplier::<DictWord>::new()
            .apply(&mut txn, "u1", Operation::Insert, "d9-w1", &member("d9", "w1", 1))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Inserted);
    }

    #[test]
    fn batch_delete_requires_dict_id_and_ownership() {
        let store = seeded();
        let applier = EntityApplier::<DictWord>::new();
        let mut txn = store.begin_write();

        let missing = applier.apply(&mut txn, "u1", Operation::BatchDelete, "", &json!({"seq": 1}));
        assert!(matches!(missing, Err(ServerError::InvalidFilter { .. })));

        let foreign = applier
            .apply(&mut txn, "u1", Operation::BatchDelete, "", &json!({"dictId": "d2"}))
            .unwrap();
        assert_eq!(foreign, ApplyOutcome::BatchDeleted(0));

        let own = applier
            .apply(&mut txn, "u1", Operation::BatchDelete, "", &json!({"dictId": "d1"}))
            .unwrap();
        assert_eq!(own, ApplyOutcome::BatchDeleted(1));
    }

    #[test]
    fn snapshot_returns_members_of_owned_dicts() {
        let store = seeded();
        let rows = EntityApplier::<DictWord>::new().snapshot(&store, "u1");
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["d1-w1"]);

        let dicts = EntityApplier::<Dict>::new().snapshot(&store, "u2");
        assert_eq!(dicts.len(), 1);
        assert_eq!(dicts[0].0, "d2");
    }
}
