//! Log identity and storage namespace derivation.
//!
//! A log is named by an `(account, name)` pair. Every key that references a
//! log in persistent storage is an `ObjectHash` over a small typed map — not
//! a string concatenation — so keys cannot collide across accounts or types
//! and are invariant under field reordering.

use serde_json::json;

use crate::error::ServerError;
use tablelog_core::objecthash::{object_hash, ObjectHash};

/// A reference to one log: the account it lives under and its canonical
/// table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRef {
    /// Owning account identifier.
    pub account: String,
    /// Canonical table name (already validated).
    pub name: String,
}

impl LogRef {
    /// Creates a log reference. `name` must already be canonical.
    #[must_use]
    pub fn new(account: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            name: name.into(),
        }
    }

    fn typed_hash(&self, kind: &str) -> Result<ObjectHash, ServerError> {
        Ok(object_hash(&json!({
            "account": self.account,
            "name": self.name,
            "type": kind,
        }))?)
    }

    /// The stable 32-byte key this log's metadata is stored under.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub fn log_key(&self) -> Result<ObjectHash, ServerError> {
        self.typed_hash("log")
    }

    /// The namespace holding this log's leaves.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub fn log_namespace(&self) -> Result<ObjectHash, ServerError> {
        self.typed_hash("log")
    }

    /// The namespace holding this log's SCT/STH sidecar index.
    ///
    /// # Errors
    ///
    /// Returns an internal error if hashing fails.
    pub fn ctlog_namespace(&self) -> Result<ObjectHash, ServerError> {
        self.typed_hash("ctlog")
    }
}

/// The shared namespace holding per-log signing keys.
///
/// # Errors
///
/// Returns an internal error if hashing fails.
pub fn metadata_namespace() -> Result<ObjectHash, ServerError> {
    Ok(object_hash(&json!({"type": "metadata"}))?)
}
