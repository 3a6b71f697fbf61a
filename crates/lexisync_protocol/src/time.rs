//! Timestamp decoding for client payloads.
//!
//! Clients send timestamps either as RFC 3339 strings or as milliseconds since
//! the Unix epoch. Use with `#[serde(deserialize_with = "...")]`; timestamps
//! always serialize as RFC 3339.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parses an RFC 3339 string or epoch milliseconds.
pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
    parse_with_offset(value).map(|t| t.with_timezone(&Utc))
}

/// Like [`parse`], but keeps the offset the client wrote. Epoch milliseconds
/// carry no offset and come back in UTC.
pub fn parse_with_offset(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text).ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(|t| t.fixed_offset()),
        _ => None,
    }
}

/// Deserializes a required timestamp.
pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse(&value).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
}

/// Deserializes a required timestamp in the client's own offset.
pub fn required_with_offset<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<FixedOffset>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    parse_with_offset(&value).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}")))
}

/// Deserializes an optional timestamp; `null` and a missing field are `None`.
pub fn optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => parse(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {value}"))),
    }
}
