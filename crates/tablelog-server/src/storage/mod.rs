//! Storage collaborator interfaces.
//!
//! The server treats its persistence as two capability sets:
//!
//! - [`StorageReader`] / [`StorageWriter`]: a namespaced key/value store for
//!   signing keys and the SCT/STH sidecar index. The single write operation,
//!   [`StorageWriter::put_if_absent`], performs the read-recheck-write inside
//!   one storage transaction and returns the winning value, which is the
//!   guard every lazy-creation path in the server relies on: two concurrent
//!   writers converge on one signing key, one SCT per hash, one STH per size.
//! - [`VerifiableLog`]: the append-only Merkle log — add a leaf, fetch a tree
//!   head, construct inclusion/consistency proofs, read entries.
//!
//! [`sqlite::SqliteStore`] implements both.

use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteStore;

/// A 32-byte storage namespace (an object hash).
pub type Namespace = [u8; 32];

/// Errors raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key does not exist in the namespace.
    #[error("no such key")]
    NoSuchKey,

    /// The requested entry or leaf hash does not exist.
    #[error("not found")]
    NotFound,

    /// The requested range cannot be satisfied.
    #[error("invalid range")]
    InvalidRange,

    /// A tree size beyond the log's current head.
    #[error("invalid tree range")]
    InvalidTreeRange,

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Read access to the keyed sidecar storage.
pub trait StorageReader: Send + Sync {
    /// Fetches the value under `key` in `ns`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchKey`] if absent.
    fn get(&self, ns: &Namespace, key: &[u8]) -> Result<Vec<u8>, StorageError>;
}

/// Write access to the keyed sidecar storage.
pub trait StorageWriter: StorageReader {
    /// Writes `value` under `key` unless the key already exists, atomically,
    /// and returns the value that ended up stored — the existing one when the
    /// write lost a race, otherwise `value`.
    ///
    /// # Errors
    ///
    /// Returns a database error on transaction failure.
    fn put_if_absent(
        &self,
        ns: &Namespace,
        key: &[u8],
        value: &[u8],
    ) -> Result<Vec<u8>, StorageError>;
}

/// One leaf as stored: the TLS-encoded `MerkleTreeLeaf` plus its extra data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafData {
    /// TLS-encoded `MerkleTreeLeaf`.
    pub leaf_input: Vec<u8>,
    /// JSON-encoded canonical record; empty for CMS leaves.
    pub extra_data: Vec<u8>,
}

/// A tree head: size and RFC 6962 root hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHead {
    /// Number of leaves covered.
    pub tree_size: u64,
    /// Root hash over the leaf sequence.
    pub root_hash: [u8; 32],
}

/// An inclusion proof: the leaf's index and its audit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// Index of the proven leaf.
    pub leaf_index: u64,
    /// Audit path to the root at the requested tree size.
    pub audit_path: Vec<[u8; 32]>,
}

/// The append-only verifiable Merkle log.
pub trait VerifiableLog: Send + Sync {
    /// Appends a leaf and returns its index.
    ///
    /// The same leaf may be appended more than once under concurrent
    /// submission; deduplication is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns a database error on transaction failure.
    fn add(&self, ns: &Namespace, leaf: &LeafData) -> Result<u64, StorageError>;

    /// The tree head at `size`, or at the current head when `size` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidTreeRange`] when `size` exceeds the
    /// current head.
    fn tree_head(&self, ns: &Namespace, size: Option<u64>) -> Result<TreeHead, StorageError>;

    /// Inclusion proof for the first leaf with `leaf_hash`, within the tree
    /// of `tree_size` leaves.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when no such leaf exists below
    /// `tree_size`, [`StorageError::InvalidTreeRange`] when `tree_size`
    /// exceeds the head.
    fn inclusion_proof(
        &self,
        ns: &Namespace,
        tree_size: u64,
        leaf_hash: &[u8; 32],
    ) -> Result<InclusionProof, StorageError>;

    /// Inclusion proof for the leaf at `leaf_index` within the tree of
    /// `tree_size` leaves.
    ///
    /// # Errors
    ///
    /// As [`VerifiableLog::inclusion_proof`].
    fn inclusion_proof_by_index(
        &self,
        ns: &Namespace,
        tree_size: u64,
        leaf_index: u64,
    ) -> Result<InclusionProof, StorageError>;

    /// Consistency proof between tree sizes `first` and `second`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRange`] unless
    /// `0 < first <= second <= head`.
    fn consistency_proof(
        &self,
        ns: &Namespace,
        first: u64,
        second: u64,
    ) -> Result<Vec<[u8; 32]>, StorageError>;

    /// The leaves in `[start, end_exclusive)`, clamped to what exists.
    ///
    /// # Errors
    ///
    /// Returns a database error on query failure.
    fn entries(
        &self,
        ns: &Namespace,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<LeafData>, StorageError>;

    /// The single leaf at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] when absent.
    fn entry(&self, ns: &Namespace, index: u64) -> Result<LeafData, StorageError>;
}
