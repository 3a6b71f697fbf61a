//! The user profile row.

use super::entity::{str_field, SyncEntity};
use super::RowLookup;
use chrono::{DateTime, Utc};
use lexisync_protocol::{tables, time, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Synchronizable part of a user's profile. Key: user id.
///
/// Clients may only UPDATE their own profile; the row itself is created by
/// account registration, outside of sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// User id.
    pub id: String,
    /// Login name.
    pub user_name: Option<String>,
    /// Display name.
    pub nick_name: Option<String>,
    /// Words to learn per day.
    pub words_per_day: Option<i32>,
    /// Days with at least one study session.
    pub learned_days: Option<i32>,
    /// Last study session.
    #[serde(default, deserialize_with = "time::optional")]
    pub last_learning_date: Option<DateTime<Utc>>,
    /// Total check-ins.
    pub daka_day_count: Option<i32>,
    /// Current check-in streak.
    pub continuous_daka_day_count: Option<i32>,
    /// Longest check-in streak.
    pub max_continuous_daka_day_count: Option<i32>,
    /// Last check-in.
    #[serde(default, deserialize_with = "time::optional")]
    pub last_daka_date: Option<DateTime<Utc>>,
    /// Score earned from check-ins; drives the ranking.
    pub daka_score: Option<i64>,
    /// Number of mastered words.
    pub mastered_words_count: Option<i32>,
    /// Cow-dung balance.
    pub cow_dung: Option<i32>,
    /// Game score.
    pub game_score: Option<i64>,
    /// Play word audio automatically.
    pub auto_play_word: Option<bool>,
    /// Play example sentences automatically.
    pub auto_play_sentence: Option<bool>,
    /// Skip the recall step.
    pub show_answers_directly: Option<bool>,
    /// Record creation time.
    #[serde(default, deserialize_with = "time::optional")]
    pub create_time: Option<DateTime<Utc>>,
    /// Record update time.
    #[serde(default, deserialize_with = "time::optional")]
    pub update_time: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Creates a profile with only the id and name set.
    pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_name: Some(user_name.into()),
            create_time: Some(now),
            update_time: Some(now),
            ..Self::default()
        }
    }
}

impl SyncEntity for UserProfile {
    const TABLE: &'static str = tables::USER;
    const OPERATIONS: &'static [Operation] = &[Operation::Update];

    fn record_key(&self) -> String {
        self.id.clone()
    }

    fn owned_by(row: &Value, user_id: &str, _lookup: &RowLookup<'_>) -> bool {
        str_field(row, "id") == Some(user_id)
    }
}
