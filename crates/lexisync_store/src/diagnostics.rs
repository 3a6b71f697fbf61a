//! Diagnostic issue records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A data-integrity problem detected during a push, kept for operator follow-up.
///
/// Issues are append-only: nothing in the sync path updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticIssue {
    /// Unique issue id.
    pub id: String,
    /// User whose data is affected.
    pub user_id: String,
    /// Machine-readable issue type (e.g. `RAW_WORD_ORDER_INVALID`).
    pub issue_type: String,
    /// Expected and actual state, human readable.
    pub details: String,
    /// When the issue was recorded.
    pub create_time: DateTime<Utc>,
}

impl DiagnosticIssue {
    /// Creates an issue stamped with the current time.
    pub fn new(
        user_id: impl Into<String>,
        issue_type: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.into(),
            issue_type: issue_type.into(),
            details: details.into(),
            create_time: Utc::now(),
        }
    }
}
