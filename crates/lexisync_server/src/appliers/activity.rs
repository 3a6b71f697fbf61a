//! Check-ins and append-only activity histories.

use super::entity::SyncEntity;
use chrono::{DateTime, FixedOffset, Utc};
use lexisync_protocol::{tables, time, Operation};
use serde::{Deserialize, Serialize};

const APPEND_ONLY: &[Operation] = &[Operation::Insert, Operation::BatchDelete];

/// A daily check-in. Key: `userId-yyyyMMdd` of the learning date, read in the
/// offset the client sent it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Daka {
    /// Owner.
    pub user_id: String,
    /// Study day the check-in is for.
    #[serde(deserialize_with = "time::required_with_offset")]
    pub for_learning_date: DateTime<FixedOffset>,
    /// Check-in message.
    pub text: Option<String>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for Daka {
    const TABLE: &'static str = tables::DAKA;
    const OPERATIONS: &'static [Operation] = &Operation::ALL;
    const FILTER_KEYS: &'static [&'static str] = &["forLearningDate", "text"];

    fn record_key(&self) -> String {
        format!("{}-{}", self.user_id, self.for_learning_date.format("%Y%m%d"))
    }
}

/// An entry in the user's operation history (login, start of study, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOper {
    /// Entry id, also the key.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Operation type, e.g. `LOGIN`, `START_LEARN`, `DAKA`.
    pub oper_type: Option<String>,
    /// When it happened.
    #[serde(default, deserialize_with = "time::optional")]
    pub oper_time: Option<DateTime<Utc>>,
    /// Free text.
    pub remark: Option<String>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for UserOper {
    const TABLE: &'static str = tables::USER_OPER;
    const OPERATIONS: &'static [Operation] = APPEND_ONLY;
    const FILTER_KEYS: &'static [&'static str] = &["operType", "operTime", "remark"];

    fn record_key(&self) -> String {
        self.id.clone()
    }
}

/// A change to the user's cow-dung balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCowDungLog {
    /// Entry id, also the key.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Amount gained (positive) or spent (negative).
    pub delta: i32,
    /// Balance after the change.
    pub cow_dung: Option<i32>,
    /// When it happened.
    #[serde(default, deserialize_with = "time::optional")]
    pub the_time: Option<DateTime<Utc>>,
    /// Why the balance changed.
    pub reason: Option<String>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl SyncEntity for UserCowDungLog {
    const TABLE: &'static str = tables::USER_COW_DUNG_LOG;
    const OPERATIONS: &'static [Operation] = APPEND_ONLY;
    const FILTER_KEYS: &'static [&'static str] = &["delta", "cowDung", "theTime", "reason"];

    fn record_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appliers::{ApplyOutcome, EntityApplier, TableApplier};
    use crate::error::ServerError;
    use lexisync_store::Store;
    use serde_json::json;

    #[test]
    fn daka_key_uses_learning_day() {
        let daka: Daka = serde_json::from_value(json!({
            "userId": "U",
            "forLearningDate": "2024-01-01T10:30:00Z",
            "text": "day one"
        }))
        .unwrap();
        assert_eq!(daka.record_key(), "U-20240101");
    }

    #[test]
    fn daka_accepts_epoch_millis() {
        let daka: Daka = serde_json::from_value(json!({
            "userId": "U",
            "forLearningDate": 1_704_067_200_000i64
        }))
        .unwrap();
        assert_eq!(daka.record_key(), "U-20240101");
    }

    #[test]
    fn daka_key_follows_client_offset() {
        let daka: Daka = serde_json::from_value(json!({
            "userId": "u1",
            "forLearningDate": "2024-01-01T00:00:00+08:00"
        }))
        .unwrap();
        assert_eq!(daka.record_key(), "u1-20240101");
        assert_eq!(
            serde_json::to_value(&daka).unwrap()["forLearningDate"],
            "2024-01-01T00:00:00+08:00"
        );
    }

    #[test]
    fn append_only_tables_reject_update_and_delete() {
        let store = Store::in_memory();
        let applier = EntityApplier::<UserOper>::new();
        let record = json!({"id": "op1", "userId": "u1", "operType": "LOGIN"});

        let mut txn = store.begin_write();
        assert_eq!(
            applier
                .apply(&mut txn, "u1", Operation::Insert, "op1", &record)
                .unwrap(),
            ApplyOutcome::Inserted
        );
        for op in [Operation::Update, Operation::Delete] {
            let result = applier.apply(&mut txn, "u1", op, "op1", &record);
            assert!(matches!(
                result,
                Err(ServerError::UnsupportedOperation { .. })
            ));
        }
    }

    #[test]
    fn cow_dung_batch_delete_by_reason() {
        let store = Store::in_memory();
        let applier = EntityApplier::<UserCowDungLog>::new();
        let mut txn = store.begin_write();
        for (id, reason) in [("c1", "daka"), ("c2", "game"), ("c3", "daka")] {
            let record = json!({"id": id, "userId": "u1", "delta": 1, "reason": reason});
            applier
                .apply(&mut txn, "u1", Operation::Insert, id, &record)
                .unwrap();
        }

        let outcome = applier
            .apply(&mut txn, "u1", Operation::BatchDelete, "", &json!({"reason": "daka"}))
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::BatchDeleted(2));
        txn.commit().unwrap();
        assert_eq!(store.row_count(tables::USER_COW_DUNG_LOG), 1);
    }
}
