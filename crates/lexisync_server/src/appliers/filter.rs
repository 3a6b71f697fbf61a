//! BATCH_DELETE filters.

use crate::error::{ServerError, ServerResult};
use lexisync_protocol::time;
use serde_json::{Map, Value};

/// Key that scopes every filter to the pushing user. Never taken from the payload.
const USER_KEY: &str = "userId";

/// A validated flat key/value filter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pairs: Vec<(String, Value)>,
}

impl Filter {
    /// Validates `payload` against the table's filter vocabulary.
    ///
    /// `userId` is dropped. What remains must be non-empty, use only
    /// `allowed` keys with scalar values, and contain every `required` key.
    pub(crate) fn parse(
        table: &str,
        payload: &Value,
        allowed: &[&str],
        required: &[&str],
    ) -> ServerResult<Self> {
        let object: &Map<String, Value> = payload
            .as_object()
            .ok_or_else(|| ServerError::invalid_filter(table, "filter must be a JSON object"))?;

        let mut pairs = Vec::with_capacity(object.len());
        for (key, value) in object {
            if key == USER_KEY {
                continue;
            }
            if !allowed.contains(&key.as_str()) {
                return Err(ServerError::invalid_filter(
                    table,
                    format!("unsupported filter key {key:?}"),
                ));
            }
            if value.is_object() || value.is_array() {
                return Err(ServerError::invalid_filter(
                    table,
                    format!("filter value for {key:?} must be a scalar"),
                ));
            }
            pairs.push((key.clone(), value.clone()));
        }

        if pairs.is_empty() {
            return Err(ServerError::invalid_filter(
                table,
                "filter has no discriminating keys",
            ));
        }
        if let Some(missing) = required
            .iter()
            .find(|key| !pairs.iter().any(|(k, _)| k == *key))
        {
            return Err(ServerError::invalid_filter(
                table,
                format!("filter must include {missing:?}"),
            ));
        }

        Ok(Self { pairs })
    }

    /// Returns true if every filter pair matches the row.
    pub(crate) fn matches(&self, row: &Value) -> bool {
        self.pairs
            .iter()
            .all(|(key, expected)| scalar_eq(row.get(key).unwrap_or(&Value::Null), expected))
    }

    /// Returns the value given for `key`.
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Compares scalars loosely: `3` equals `"3"`, and timestamps compare by instant.
fn scalar_eq(actual: &Value, expected: &Value) -> bool {
    match (canonical(actual), canonical(expected)) {
        (None, None) => true,
        (Some(a), Some(b)) if a == b => true,
        (Some(_), Some(_)) => match (time::parse(actual), time::parse(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

fn canonical(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEYS: &[&str] = &["wordId", "lifeValue", "lastLearningDate"];

    #[test]
    fn user_key_is_ignored() {
        let filter = Filter::parse("t", &json!({"userId": "other", "wordId": "w1"}), KEYS, &[]).unwrap();
        assert!(filter.matches(&json!({"userId": "me", "wordId": "w1"})));
        assert!(filter.get(USER_KEY).is_none());
    }

    #[test]
    fn rejects_empty_and_user_only() {
        assert!(Filter::parse("t", &json!({}), KEYS, &[]).is_err());
        assert!(Filter::parse("t", &json!({"userId": "u1"}), KEYS, &[]).is_err());
    }

    #[test]
    fn rejects_unknown_keys_and_non_objects() {
        assert!(Filter::parse("t", &json!({"bogus": 1}), KEYS, &[]).is_err());
        assert!(Filter::parse("t", &json!([1, 2]), KEYS, &[]).is_err());
        assert!(Filter::parse("t", &json!({"wordId": {"$ne": 1}}), KEYS, &[]).is_err());
    }

    #[test]
    fn enforces_required_keys() {
        let err = Filter::parse("dict_word", &json!({"seq": 1}), &["dictId", "seq"], &["dictId"]);
        assert!(matches!(err, Err(ServerError::InvalidFilter { .. })));
        assert!(Filter::parse("dict_word", &json!({"dictId": "d1"}), &["dictId"], &["dictId"]).is_ok());
    }

    #[test]
    fn loose_scalar_matching() {
        let filter = Filter::parse("t", &json!({"lifeValue": "3"}), KEYS, &[]).unwrap();
        assert!(filter.matches(&json!({"lifeValue": 3})));
        assert!(!filter.matches(&json!({"lifeValue": 4})));
        assert!(!filter.matches(&json!({})));

        let filter = Filter::parse(
            "t",
            &json!({"lastLearningDate": "2024-01-01T08:00:00+08:00"}),
            KEYS,
            &[],
        )
        .unwrap();
        assert!(filter.matches(&json!({"lastLearningDate": "2024-01-01T00:00:00Z"})));
    }

    #[test]
    fn null_matches_missing() {
        let filter = Filter::parse("t", &json!({"lifeValue": null}), KEYS, &[]).unwrap();
        assert!(filter.matches(&json!({"wordId": "w1"})));
    }
}
