//! Canonicalisation of table rows before hashing.
//!
//! A record reaches the log from two directions: decoded from a JSON
//! submission, or read out of a relational table. Both paths must commit to
//! the same 32-byte digest, so before hashing every record is reduced to one
//! canonical JSON form:
//!
//! 1. Keys beginning with `_` are dropped (internal bookkeeping columns such
//!    as `_id`).
//! 2. The `signed_certificate_timestamp` column is dropped — the promise must
//!    not cover itself.
//! 3. Null values are dropped, so columns can be added to a table over time
//!    without invalidating previously issued signatures.
//! 4. Timestamp-typed values are rendered in the lossless postgres JSON
//!    format before they enter the map (see [`format_pg_timestamp`]), so a
//!    value read through a database driver agrees byte-for-byte with the same
//!    value read through a JSON API.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::objecthash::{object_hash, ObjectHash, ObjectHashError};

/// The column that carries the log's promise back to the row. Never hashed.
pub const SCT_COLUMN: &str = "signed_certificate_timestamp";

/// Filters a record down to its canonical field map.
///
/// Drops `_`-prefixed keys, the [`SCT_COLUMN`] and null values. The input is
/// not modified.
#[must_use]
pub fn canonicalise(record: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in record {
        if key.starts_with('_') || key == SCT_COLUMN || value.is_null() {
            continue;
        }
        out.insert(key.clone(), value.clone());
    }
    out
}

/// Filters a record and computes its object hash.
///
/// Returns the canonical map alongside the hash; submitters send the map as
/// the leaf's extra data so that auditors can recompute the hash.
///
/// # Errors
///
/// Returns an error if a field holds a number the hash cannot normalise.
pub fn filter_and_hash(
    record: &Map<String, Value>,
) -> Result<(Map<String, Value>, ObjectHash), ObjectHashError> {
    let canonical = canonicalise(record);
    let hash = object_hash(&Value::Object(canonical.clone()))?;
    Ok((canonical, hash))
}

/// Renders a timestamp the way the postgres JSON operators do.
///
/// Microsecond precision with trailing zeros trimmed (and the dot removed for
/// whole seconds), UTC offset spelled `+00:00`. Database-origin timestamps
/// pass through this before hashing so they match their JSON rendering.
#[must_use]
pub fn format_pg_timestamp(ts: DateTime<Utc>) -> String {
    let rendered = ts.to_rfc3339_opts(SecondsFormat::Micros, false);
    // `2024-07-01T12:00:00.500000+00:00` → `2024-07-01T12:00:00.5+00:00`
    let Some(dot) = rendered.find('.') else {
        return rendered;
    };
    let (head, tail) = rendered.split_at(dot);
    let offset_at = tail.find(['+', '-']).unwrap_or(tail.len());
    let (fraction, offset) = tail.split_at(offset_at);
    let fraction = fraction.trim_end_matches('0').trim_end_matches('.');
    format!("{head}{fraction}{offset}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn drops_internal_sct_and_null_fields() {
        let full = record(json!({
            "a": 1,
            "b": null,
            "_id": 7,
            "signed_certificate_timestamp": "AAAA",
        }));
        let bare = record(json!({"a": 1}));

        let (_, full_hash) = filter_and_hash(&full).unwrap();
        let (_, bare_hash) = filter_and_hash(&bare).unwrap();
        assert_eq!(full_hash, bare_hash);
    }

    #[test]
    fn added_underscore_field_does_not_change_hash() {
        let a = record(json!({"x": "y"}));
        let b = record(json!({"x": "y", "_foo": "anything"}));
        assert_eq!(
            filter_and_hash(&a).unwrap().1,
            filter_and_hash(&b).unwrap().1
        );
    }

    #[test]
    fn canonicalisation_is_a_fixpoint() {
        let raw = record(json!({
            "name": "rego",
            "count": 3,
            "empty": null,
            "_rowid": 12,
        }));
        let once = canonicalise(&raw);
        let twice = canonicalise(&once);
        assert_eq!(once, twice);

        // And hashing agrees with a JSON round-trip of the canonical form.
        let serialized = serde_json::to_vec(&Value::Object(once.clone())).unwrap();
        let reparsed: Value = serde_json::from_slice(&serialized).unwrap();
        assert_eq!(
            object_hash(&Value::Object(once)).unwrap(),
            object_hash(&reparsed).unwrap()
        );
    }

    #[test]
    fn pg_timestamp_trims_trailing_zeros() {
        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(format_pg_timestamp(ts), "2024-07-01T12:00:00+00:00");

        let ts = ts + chrono::Duration::microseconds(500_000);
        assert_eq!(format_pg_timestamp(ts), "2024-07-01T12:00:00.5+00:00");

        let ts = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(format_pg_timestamp(ts), "2024-07-01T12:00:00.123456+00:00");
    }
}
