//! # tablelog-server
//!
//! An RFC 6962-style set of verifiable log servers over REST, generalised so
//! each log commits to arbitrary table rows instead of X.509 certificates.
//!
//! The server exposes, per log, the CT read/write surface under
//! `/dataset/{logname}/ct/v1/`:
//!
//! - `metadata` — the log's public key
//! - `add-objecthash` — submit a record's object hash; returns an SCT
//! - `get-objecthash` — look up the SCT previously issued for a hash
//! - `get-sth`, `get-sth-consistency`, `get-proof-by-hash`, `get-entries`,
//!   `get-entry-and-proof` — the standard audit surface
//!
//! Each log lazily provisions an ECDSA P-256 signing key on its first write.
//! Issued SCTs and STHs are frozen in a keyed sidecar index so repeated
//! requests return byte-identical signatures.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod index;
pub mod keys;
pub mod state;
pub mod storage;
pub mod submission;

pub use config::ServerConfig;
pub use error::ServerError;
pub use state::AppState;

/// Milliseconds since the Unix epoch, the timestamp unit used on the wire.
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
