//! Post-sync invariant checks.
//!
//! Checks run after every mutation of a push has been applied and before the
//! version advances. A violation rolls the whole push back.

use crate::appliers::str_field;
use crate::error::ServerResult;
use lexisync_protocol::{codes, tables};
use lexisync_store::WriteTransaction;
use serde_json::Value;

/// A failed invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Issue type recorded in diagnostics and sent as the failure code.
    pub issue_type: String,
    /// Expected and actual state.
    pub details: String,
}

/// An invariant that must hold once a whole batch is applied.
pub trait PostSyncCheck: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspects the transaction's view of `user_id`'s data.
    fn check(&self, txn: &WriteTransaction<'_>, user_id: &str) -> ServerResult<Option<Violation>>;
}

/// The raw-word dictionary must be numbered exactly `1..=N`.
#[derive(Debug, Clone)]
pub struct RawWordOrderCheck {
    dict_name: String,
}

impl RawWordOrderCheck {
    /// Checks dictionaries named `dict_name`.
    pub fn new(dict_name: impl Into<String>) -> Self {
        Self {
            dict_name: dict_name.into(),
        }
    }
}

impl PostSyncCheck for RawWordOrderCheck {
    fn name(&self) -> &'static str {
        "raw_word_order"
    }

    fn check(&self, txn: &WriteTransaction<'_>, user_id: &str) -> ServerResult<Option<Violation>> {
        let dicts = txn.scan(tables::DICT, |_, row| {
            str_field(row, "ownerId") == Some(user_id)
                && str_field(row, "name") == Some(self.dict_name.as_str())
        })?;

        for (dict_id, _) in dicts {
            let mut seqs: Vec<i64> = txn
                .scan(tables::DICT_WORD, |_, row| {
                    str_field(row, "dictId") == Some(dict_id.as_str())
                })?
                .iter()
                .map(|(_, row)| row.get("seq").and_then(Value::as_i64).unwrap_or(0))
                .collect();
            seqs.sort_unstable();

            if let Some(problem) = sequence_problem(&seqs) {
                return Ok(Some(Violation {
                    issue_type: codes::RAW_WORD_ORDER_INVALID.to_string(),
                    details: format!(
                        "dict {dict_id} has {} words, expected seq 1..={}: {problem}",
                        seqs.len(),
                        seqs.len()
                    ),
                }));
            }
        }
        Ok(None)
    }
}

/// Describes the first deviation of sorted `seqs` from `1..=len`.
fn sequence_problem(seqs: &[i64]) -> Option<String> {
    for (index, &seq) in seqs.iter().enumerate() {
        let expected = index as i64 + 1;
        if seq == expected {
            continue;
        }
        if index > 0 && seqs[index - 1] == seq {
            return Some(format!("duplicate seq {seq}"));
        }
        return Some(format!("found seq {seq} where {expected} was expected"));
    }
    None
}
