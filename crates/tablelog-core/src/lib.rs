//! # tablelog-core
//!
//! Core library for `tablelog` — a family of RFC 6962-style transparency
//! logs whose leaves commit to arbitrary structured records (rows of a data
//! table) rather than X.509 certificates.
//!
//! This crate holds everything that both sides of the wire need to agree on:
//!
//! - **`ObjectHash`**: a deterministic, field-order-insensitive 32-byte digest
//!   over JSON-shaped values
//! - **Canonicalisation**: the filtering and normalisation applied to a table
//!   row before it is hashed
//! - **RFC 6962 structures**: TLS-encoded `MerkleTreeLeaf`,
//!   `SignedCertificateTimestamp`, `DigitallySigned` and the signature inputs
//!   that bind them to a log
//! - **Merkle tree math**: root computation, inclusion and consistency
//!   proofs, and their verification
//! - **P-256 signing**: log key generation, DER round-trips, log ID
//!   derivation and signature verification
//!
//! The crate performs no I/O; servers, clients and pipelines build on it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod canonical;
pub mod crypto;
pub mod merkle;
pub mod objecthash;
pub mod records;
pub mod rfc6962;
pub mod table_name;
pub mod tls;
pub mod verifier;

pub use canonical::filter_and_hash;
pub use crypto::LogSigningKey;
pub use objecthash::{object_hash, ObjectHash, HASH_SIZE};
pub use rfc6962::MerkleTreeLeaf;
pub use verifier::LogVerifier;
