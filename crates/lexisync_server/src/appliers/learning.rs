//! Study-progress tables.

use super::entity::SyncEntity;
use chrono::{DateTime, Utc};
use lexisync_protocol::{tables, time, Operation};
use serde::{Deserialize, Serialize};

const FULL_CRUD: &[Operation] = &Operation::ALL;

/// A word in the user's current study rotation. Key: `userId-wordId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningWord {
    /// Owner.
    pub user_id: String,
    /// Word being learned.
    pub word_id: String,
    /// When the word entered the rotation.
    #[serde(default, deserialize_with = "time::optional")]
    pub add_time: Option<DateTime<Utc>>,
    /// Study day on which the word was added.
    pub add_day: Option<i32>,
    /// Remaining repetitions before the word counts as learned.
    pub life_value: Option<i32>,
    /// Last time the word was studied.
    #[serde(default, deserialize_with = "time::optional")]
    pub last_learning_date: Option<DateTime<Utc>>,
    /// Position in today's queue.
    pub learning_order: Option<i32>,
    /// Times studied.
    pub learned_times: Option<i32>,
    /// Whether the word was new today.
    pub is_today_new_word: Option<bool>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for LearningWord {
    const TABLE: &'static str = tables::LEARNING_WORD;
    const OPERATIONS: &'static [Operation] = FULL_CRUD;
    const FILTER_KEYS: &'static [&'static str] = &["wordId", "lifeValue", "lastLearningDate"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.word_id)
    }
}

/// A dictionary the user has selected for study. Key: `userId-dictId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningDict {
    /// Owner.
    pub user_id: String,
    /// Selected dictionary.
    pub dict_id: String,
    /// Word the user stopped at.
    pub current_word_id: Option<String>,
    /// Sequence number of the current word.
    pub current_word_seq: Option<i32>,
    /// Whether this dictionary is prioritized when picking new words.
    pub is_privileged: Option<bool>,
    /// Whether already mastered words are included.
    pub fetch_mastered: Option<bool>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for LearningDict {
    const TABLE: &'static str = tables::LEARNING_DICT;
    const OPERATIONS: &'static [Operation] = FULL_CRUD;
    const FILTER_KEYS: &'static [&'static str] = &["dictId", "isPrivileged"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.dict_id)
    }
}

/// One configured step of the user's study routine. Key: `userId-studyStep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStudyStep {
    /// Owner.
    pub user_id: String,
    /// Step name.
    pub study_step: String,
    /// Position in the routine.
    pub index: Option<i32>,
    /// `ACTIVE` or `INACTIVE`.
    pub state: Option<String>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for UserStudyStep {
    const TABLE: &'static str = tables::USER_STUDY_STEP;
    const OPERATIONS: &'static [Operation] = FULL_CRUD;
    const FILTER_KEYS: &'static [&'static str] = &["studyStep", "state", "index"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.study_step)
    }
}

/// A word the user answered wrongly. Key: `userId-wordId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWrongWord {
    /// Owner.
    pub user_id: String,
    /// Word answered wrongly.
    pub word_id: String,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for UserWrongWord {
    const TABLE: &'static str = tables::USER_WRONG_WORD;
    const OPERATIONS: &'static [Operation] = FULL_CRUD;
    const FILTER_KEYS: &'static [&'static str] = &["wordId", "createTime"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.word_id)
    }
}

/// A word the user has mastered. Key: `userId-wordId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteredWord {
    /// Owner.
    pub user_id: String,
    /// Mastered word.
    pub word_id: String,
    /// When the word was mastered.
    #[serde(default, deserialize_with = "time::optional")]
    pub master_at_time: Option<DateTime<Utc>>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for MasteredWord {
    const TABLE: &'static str = tables::MASTERED_WORD;
    const OPERATIONS: &'static [Operation] = FULL_CRUD;
    const FILTER_KEYS: &'static [&'static str] = &["wordId", "masterAtTime"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.word_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appliers::{ApplyOutcome, EntityApplier, SkipReason, TableApplier};
    use crate::error::ServerError;
    use lexisync_store::Store;
    use serde_json::{json, Value};

    fn word(user: &str, word: &str, life: i32) -> Value {
        json!({"userId": user, "wordId": word, "lifeValue": life})
    }

    fn apply(store: &Store, user: &str, op: Operation, record_id: &str, payload: Value) -> ApplyOutcome {
        let applier = EntityApplier::<LearningWord>::new();
        let mut txn = store.begin_write();
        let outcome = applier.apply(&mut txn, user, op, record_id, &payload).unwrap();
        txn.commit().unwrap();
        outcome
    }

    #[test]
    fn duplicate_insert_is_skipped() {
        let store = Store::in_memory();
        assert_eq!(
            apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 5)),
            ApplyOutcome::Inserted
        );
        assert_eq!(
            apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 1)),
            ApplyOutcome::Skipped(SkipReason::Duplicate)
        );
        assert_eq!(store.get(tables::LEARNING_WORD, "u1-w1").unwrap()["lifeValue"], 5);
    }

    #[test]
    fn update_creates_missing_row() {
        let store = Store::in_memory();
        assert_eq!(
            apply(&store, "u1", Operation::Update, "u1-w1", word("u1", "w1", 2)),
            ApplyOutcome::Upserted
        );
        assert_eq!(
            apply(&store, "u1", Operation::Update, "u1-w1", word("u1", "w1", 1)),
            ApplyOutcome::Updated
        );
        assert_eq!(store.get(tables::LEARNING_WORD, "u1-w1").unwrap()["lifeValue"], 1);
    }

    #[test]
    fn delete_by_payload_or_record_id() {
        let store = Store::in_memory();
        apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 5));
        apply(&store, "u1", Operation::Insert, "u1-w2", word("u1", "w2", 5));

        assert_eq!(
            apply(&store, "u1", Operation::Delete, "u1-w1", word("u1", "w1", 5)),
            ApplyOutcome::Deleted
        );
        assert_eq!(
            apply(&store, "u1", Operation::Delete, "u1-w2", json!({})),
            ApplyOutcome::Deleted
        );
        assert_eq!(
            apply(&store, "u1", Operation::Delete, "u1-w2", json!({})),
            ApplyOutcome::Skipped(SkipReason::Missing)
        );
        assert_eq!(store.row_count(tables::LEARNING_WORD), 0);
    }

    #[test]
    fn record_id_must_match_payload_key() {
        let store = Store::in_memory();
        apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 5));

        let applier = EntityApplier::<LearningWord>::new();
        let mut txn = store.begin_write();
        for op in [Operation::Insert, Operation::Update, Operation::Delete] {
            let result = applier.apply(&mut txn, "u1", op, "u1-w2", &word("u1", "w1", 1));
            assert!(
                matches!(&result, Err(ServerError::RecordIdMismatch { record_id, key, .. })
                    if record_id == "u1-w2" && key == "u1-w1"),
                "{op}: {result:?}"
            );
        }
        let empty = applier.apply(&mut txn, "u1", Operation::Insert, "", &word("u1", "w3", 1));
        assert!(matches!(empty, Err(ServerError::RecordIdMismatch { .. })));
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn foreign_records_are_rejected() {
        let store = Store::in_memory();
        let applier = EntityApplier::<LearningWord>::new();
        let mut txn = store.begin_write();
        let result = applier.apply(&mut txn, "u1", Operation::Insert, "u2-w1", &word("u2", "w1", 5));
        assert!(matches!(result, Err(ServerError::OwnershipMismatch { .. })));
    }

    #[test]
    fn batch_delete_is_scoped_to_caller() {
        let store = Store::in_memory();
        apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 0));
        apply(&store, "u1", Operation::Insert, "u1-w2", word("u1", "w2", 3));
        apply(&store, "u2", Operation::Insert, "u2-w1", word("u2", "w1", 0));

        let outcome = apply(
            &store,
            "u1",
            Operation::BatchDelete,
            "",
            json!({"userId": "u2", "lifeValue": 0}),
        );
        assert_eq!(outcome, ApplyOutcome::BatchDeleted(1));
        assert!(store.get(tables::LEARNING_WORD, "u1-w1").is_none());
        assert!(store.get(tables::LEARNING_WORD, "u1-w2").is_some());
        assert!(store.get(tables::LEARNING_WORD, "u2-w1").is_some());
    }

    #[test]
    fn batch_delete_without_discriminator_is_rejected() {
        let store = Store::in_memory();
        apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 0));

        let applier = EntityApplier::<LearningWord>::new();
        let mut txn = store.begin_write();
        let result = applier.apply(&mut txn, "u1", Operation::BatchDelete, "", &json!({"userId": "u1"}));
        assert!(matches!(result, Err(ServerError::InvalidFilter { .. })));
        assert_eq!(txn.write_count(), 0);
    }

    #[test]
    fn payload_must_match_schema() {
        let store = Store::in_memory();
        let applier = EntityApplier::<UserStudyStep>::new();
        let mut txn = store.begin_write();
        let result = applier.apply(&mut txn, "u1", Operation::Insert, "x", &json!({"userId": "u1"}));
        assert!(matches!(result, Err(ServerError::InvalidPayload { .. })));
    }

    #[test]
    fn snapshot_returns_only_own_rows() {
        let store = Store::in_memory();
        apply(&store, "u1", Operation::Insert, "u1-w1", word("u1", "w1", 0));
        apply(&store, "u2", Operation::Insert, "u2-w1", word("u2", "w1", 0));

        let rows = EntityApplier::<LearningWord>::new().snapshot(&store, "u1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "u1-w1");
    }
}
