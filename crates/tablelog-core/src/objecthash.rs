//! `ObjectHash` — a deterministic digest over JSON-shaped values.
//!
//! The construction is type-tagged SHA-256 (Laurie/Cardozo): every value is
//! hashed as `SHA256(tag || payload)`, where the tag is a single ASCII byte
//! identifying the type. Maps hash their entries as sorted `H(key) || H(value)`
//! pairs, so the digest is insensitive to field ordering. Two independently
//! produced representations of the same record — one from a database row, one
//! from a JSON submission — therefore agree on a single 32-byte commitment.
//!
//! All numbers hash through the IEEE-754 float normalisation, including
//! integers. JSON cannot distinguish `1` from `1.0`, and the canonicalisation
//! pipeline round-trips every record through JSON, so treating every number
//! as a float is what keeps the database and JSON ingestion paths in
//! agreement.
//!
//! Strings hash as their raw UTF-8 bytes, without Unicode normalisation,
//! matching the behaviour of the Go implementation this format is
//! interoperable with.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Size of an object hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte object hash.
pub type ObjectHash = [u8; HASH_SIZE];

/// Type tag for booleans.
const TAG_BOOL: u8 = b'b';
/// Type tag for dictionaries.
const TAG_DICT: u8 = b'd';
/// Type tag for floats (all JSON numbers).
const TAG_FLOAT: u8 = b'f';
/// Type tag for lists.
const TAG_LIST: u8 = b'l';
/// Type tag for null.
const TAG_NULL: u8 = b'n';
/// Type tag for unicode strings.
const TAG_UNICODE: u8 = b'u';

/// Upper bound on the normalised mantissa length. A finite IEEE-754 double
/// always normalises well within this; exceeding it means the input was not
/// a finite double.
const MAX_MANTISSA_LEN: usize = 1000;

/// Errors that can occur while hashing a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectHashError {
    /// The value contained a number that is not a finite IEEE-754 double.
    #[error("number is not a finite IEEE-754 double")]
    NonFiniteNumber,

    /// Float normalisation did not terminate within the mantissa bound.
    #[error("float mantissa exceeded {MAX_MANTISSA_LEN} digits")]
    MantissaTooLong,
}

fn hash_tagged(tag: u8, payload: &[u8]) -> ObjectHash {
    let mut h = Sha256::new();
    h.update([tag]);
    h.update(payload);
    h.finalize().into()
}

/// Normalises a float to the `objecthash` sign/exponent/mantissa string.
///
/// Zero normalises to `+0:`. Other finite values are reduced to a mantissa in
/// `(0.5, 1]` by repeated halving/doubling, recording the binary exponent,
/// then the mantissa is emitted bit by bit.
fn normalize_float(value: f64) -> Result<String, ObjectHashError> {
    if !value.is_finite() {
        return Err(ObjectHashError::NonFiniteNumber);
    }
    if value == 0.0 {
        return Ok("+0:".to_owned());
    }

    let mut f = value;
    let mut s = String::new();
    if f < 0.0 {
        s.push('-');
        f = -f;
    } else {
        s.push('+');
    }

    let mut exponent = 0i32;
    while f > 1.0 {
        f /= 2.0;
        exponent += 1;
    }
    while f <= 0.5 {
        f *= 2.0;
        exponent -= 1;
    }
    s.push_str(&exponent.to_string());
    s.push(':');

    while f != 0.0 {
        if f >= 1.0 {
            s.push('1');
            f -= 1.0;
        } else {
            s.push('0');
        }
        if s.len() > MAX_MANTISSA_LEN {
            return Err(ObjectHashError::MantissaTooLong);
        }
        f *= 2.0;
    }

    Ok(s)
}

/// Computes the object hash of a JSON value.
///
/// # Errors
///
/// Returns an error if the value contains a number that cannot be normalised
/// as a finite IEEE-754 double.
pub fn object_hash(value: &Value) -> Result<ObjectHash, ObjectHashError> {
    match value {
        Value::Null => Ok(hash_tagged(TAG_NULL, b"")),
        Value::Bool(b) => Ok(hash_tagged(TAG_BOOL, if *b { b"1" } else { b"0" })),
        Value::Number(n) => {
            let f = n.as_f64().ok_or(ObjectHashError::NonFiniteNumber)?;
            let normalized = normalize_float(f)?;
            Ok(hash_tagged(TAG_FLOAT, normalized.as_bytes()))
        },
        Value::String(s) => Ok(hash_tagged(TAG_UNICODE, s.as_bytes())),
        Value::Array(items) => {
            let mut payload = Vec::with_capacity(items.len() * HASH_SIZE);
            for item in items {
                payload.extend_from_slice(&object_hash(item)?);
            }
            Ok(hash_tagged(TAG_LIST, &payload))
        },
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, val) in map {
                let mut entry = [0u8; HASH_SIZE * 2];
                entry[..HASH_SIZE].copy_from_slice(&hash_tagged(TAG_UNICODE, key.as_bytes()));
                entry[HASH_SIZE..].copy_from_slice(&object_hash(val)?);
                entries.push(entry);
            }
            entries.sort_unstable();
            let mut payload = Vec::with_capacity(entries.len() * HASH_SIZE * 2);
            for entry in &entries {
                payload.extend_from_slice(entry);
            }
            Ok(hash_tagged(TAG_DICT, &payload))
        },
    }
}
