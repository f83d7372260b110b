//! Content-addressed SCT/STH index.
//!
//! A thin typed wrapper over the keyed sidecar storage. Issued SCTs live
//! under `"sct" || object_hash`, frozen STHs under
//! `"sth" || big_endian(tree_size)`, both as protobuf records. Writes go
//! through `put_if_absent`, so whichever writer persists first defines the
//! bytes every later reader sees — re-submitted hashes and re-requested tree
//! sizes get byte-identical signatures forever.

use std::sync::Arc;

use prost::Message;

use crate::storage::{Namespace, StorageError, StorageWriter};
use tablelog_core::records::{AddResponse, SignedTreeHead};

const SCT_PREFIX: &[u8] = b"sct";
const STH_PREFIX: &[u8] = b"sth";

fn sct_key(object_hash: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(SCT_PREFIX.len() + object_hash.len());
    key.extend_from_slice(SCT_PREFIX);
    key.extend_from_slice(object_hash);
    key
}

fn sth_key(tree_size: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(STH_PREFIX.len() + 8);
    key.extend_from_slice(STH_PREFIX);
    key.extend_from_slice(&tree_size.to_be_bytes());
    key
}

/// Typed index over the per-log sidecar namespace.
pub struct SctSthIndex {
    storage: Arc<dyn StorageWriter>,
}

impl SctSthIndex {
    /// Creates an index over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageWriter>) -> Self {
        Self { storage }
    }

    /// Looks up the SCT issued for `object_hash`, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error on database failure or a corrupt record.
    pub fn get_sct(
        &self,
        ns: &Namespace,
        object_hash: &[u8],
    ) -> Result<Option<AddResponse>, StorageError> {
        match self.storage.get(ns, &sct_key(object_hash)) {
            Ok(bytes) => Ok(Some(decode_sct(&bytes)?)),
            Err(StorageError::NoSuchKey) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Persists an SCT for `object_hash` unless one exists, returning the
    /// winning record.
    ///
    /// # Errors
    ///
    /// Returns a storage error on database failure or a corrupt record.
    pub fn put_sct_if_absent(
        &self,
        ns: &Namespace,
        object_hash: &[u8],
        record: &AddResponse,
    ) -> Result<AddResponse, StorageError> {
        let winner =
            self.storage
                .put_if_absent(ns, &sct_key(object_hash), &record.encode_to_vec())?;
        decode_sct(&winner)
    }

    /// Looks up the frozen STH at `tree_size`, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error on database failure or a corrupt record.
    pub fn get_sth(
        &self,
        ns: &Namespace,
        tree_size: u64,
    ) -> Result<Option<SignedTreeHead>, StorageError> {
        match self.storage.get(ns, &sth_key(tree_size)) {
            Ok(bytes) => Ok(Some(decode_sth(&bytes)?)),
            Err(StorageError::NoSuchKey) => Ok(None),
            Err(other) => Err(other),
        }
    }

    /// Persists an STH at `tree_size` unless one exists, returning the
    /// winning record.
    ///
    /// # Errors
    ///
    /// Returns a storage error on database failure or a corrupt record.
    pub fn put_sth_if_absent(
        &self,
        ns: &Namespace,
        record: &SignedTreeHead,
    ) -> Result<SignedTreeHead, StorageError> {
        let winner = self
            .storage
            .put_if_absent(ns, &sth_key(record.tree_size), &record.encode_to_vec())?;
        decode_sth(&winner)
    }
}

fn decode_sct(bytes: &[u8]) -> Result<AddResponse, StorageError> {
    AddResponse::decode(bytes).map_err(|_| StorageError::Corrupt("sct record".into()))
}

fn decode_sth(bytes: &[u8]) -> Result<SignedTreeHead, StorageError> {
    SignedTreeHead::decode(bytes).map_err(|_| StorageError::Corrupt("sth record".into()))
}
