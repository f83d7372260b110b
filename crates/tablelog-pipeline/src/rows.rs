//! Reading local table rows back as canonical JSON maps.
//!
//! The write-back path re-reads the row it is about to stamp and recomputes
//! its hash, so the row-to-JSON conversion must agree exactly with the
//! upstream JSON rendering. `SQLite` stores declared `TIMESTAMP`/`DATETIME`
//! columns as text; those are re-rendered through the postgres JSON format
//! the canonicaliser expects, which is what keeps the database path and the
//! JSON path hashing identically.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};

use crate::error::PipelineError;
use tablelog_core::canonical::format_pg_timestamp;

/// Extracts the integral `_id` of a JSON record.
///
/// JSON numbers cannot represent integers as such; the value must still be
/// integral or the record is rejected.
///
/// # Errors
///
/// Returns an error when `_id` is missing or not an integer.
pub fn json_int_id(record: &Map<String, Value>) -> Result<i64, PipelineError> {
    let value = record
        .get("_id")
        .ok_or_else(|| PipelineError::BadRecord("no _id found for record".into()))?;
    if let Some(id) = value.as_i64() {
        return Ok(id);
    }
    if let Some(f) = value.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        let id = f as i64;
        #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
        if f == id as f64 {
            return Ok(id);
        }
    }
    Err(PipelineError::BadRecord(
        "record _id is not an integer".into(),
    ))
}

/// True when a declared column type holds wall-clock timestamps.
fn is_timestamp_decl(decl: &str) -> bool {
    let upper = decl.to_ascii_uppercase();
    upper.contains("TIMESTAMP") || upper.contains("DATETIME")
}

/// Parses the storage text of a timestamp column.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Reads the row with the given `_id` from `table` as a JSON map.
///
/// `table` must already be canonical. Returns `Ok(None)` when the row is
/// gone; more than one match is an error, because the write-back would not
/// know which row its SCT attests to.
///
/// # Errors
///
/// Returns an error on query failure or ambiguous matches.
pub fn read_row(
    conn: &Connection,
    table: &str,
    id: i64,
) -> Result<Option<Map<String, Value>>, PipelineError> {
    let decls = column_decls(conn, table)?;

    let mut stmt = conn.prepare(&format!(r#"SELECT * FROM "{table}" WHERE _id = ?1"#))?;
    let column_names: Vec<String> = stmt.column_names().iter().map(|&s| s.to_owned()).collect();

    let mut rows = stmt.query([id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let mut record = Map::new();
    for (i, name) in column_names.iter().enumerate() {
        let declared_timestamp = decls
            .iter()
            .any(|(col, decl)| col == name && is_timestamp_decl(decl));
        record.insert(name.clone(), value_to_json(row.get_ref(i)?, declared_timestamp));
    }

    if rows.next()?.is_some() {
        return Err(PipelineError::BadRecord(
            "multiple records found with same _id".into(),
        ));
    }
    Ok(Some(record))
}

fn column_decls(conn: &Connection, table: &str) -> Result<Vec<(String, String)>, PipelineError> {
    let mut stmt = conn.prepare(&format!(r#"PRAGMA table_info("{table}")"#))?;
    let decls = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(decls)
}

fn value_to_json(value: ValueRef<'_>, declared_timestamp: bool) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if declared_timestamp {
                if let Some(ts) = parse_timestamp(&text) {
                    return Value::String(format_pg_timestamp(ts));
                }
            }
            Value::String(text)
        },
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}
