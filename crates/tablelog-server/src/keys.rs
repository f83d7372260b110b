//! Per-log signing key lifecycle.
//!
//! Each log gets its own ECDSA P-256 key, created lazily on the log's first
//! successful write and never rotated. Keys live in the shared `metadata`
//! namespace under the log key, as a protobuf [`LogMetadata`] record holding
//! the SEC1 DER private key.
//!
//! Lookups go through an in-memory cache under a read/write lock with
//! double-checked insertion. The cache is only an accelerator: the definitive
//! creation guard is the storage layer's `put_if_absent`, which makes two
//! concurrent creators converge on a single persisted key.
//!
//! The cache also doubles as the read-mode existence gate — a `get` with
//! `create = false` against an absent log fails with `NotFound`, which is
//! what stops read requests from provisioning storage for logs that do not
//! exist.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use prost::Message;

use crate::error::ServerError;
use crate::identity::{metadata_namespace, LogRef};
use crate::storage::{StorageError, StorageWriter};
use tablelog_core::crypto::LogSigningKey;
use tablelog_core::records::LogMetadata;

/// Caching store of per-log signing keys.
pub struct SigningKeyStore {
    storage: Arc<dyn StorageWriter>,
    cache: RwLock<HashMap<[u8; 32], Arc<LogSigningKey>>>,
}

impl SigningKeyStore {
    /// Creates a key store over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageWriter>) -> Self {
        Self {
            storage,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches the signing key for `log`.
    ///
    /// With `create = false` an absent key is `NotFound`; with
    /// `create = true` a fresh key is generated and persisted, unless a
    /// concurrent creator won the race, in which case the winner's key is
    /// returned.
    ///
    /// # Errors
    ///
    /// `NotFound` for absent logs in read mode; `Internal` for storage or
    /// crypto failures.
    pub fn get(&self, log: &LogRef, create: bool) -> Result<Arc<LogSigningKey>, ServerError> {
        let log_key = log.log_key()?;

        if let Some(key) = self
            .cache
            .read()
            .expect("key cache lock poisoned")
            .get(&log_key)
        {
            return Ok(Arc::clone(key));
        }

        let ns = metadata_namespace()?;
        match self.storage.get(&ns, &log_key) {
            Ok(bytes) => self.cache_key(log_key, &bytes),
            Err(StorageError::NoSuchKey) => {
                if !create {
                    return Err(ServerError::NotFound);
                }
                let fresh = LogSigningKey::generate()?;
                let record = LogMetadata {
                    private_key_der: fresh.to_sec1_der()?,
                };
                // put_if_absent re-checks inside the storage transaction;
                // whichever writer got there first is authoritative.
                let winner = self
                    .storage
                    .put_if_absent(&ns, &log_key, &record.encode_to_vec())?;
                tracing::info!(log = %log.name, "provisioned signing key");
                self.cache_key(log_key, &winner)
            },
            Err(other) => Err(other.into()),
        }
    }

    /// Parses persisted metadata and inserts the key into the cache.
    fn cache_key(
        &self,
        log_key: [u8; 32],
        metadata_bytes: &[u8],
    ) -> Result<Arc<LogSigningKey>, ServerError> {
        let metadata =
            LogMetadata::decode(metadata_bytes).map_err(|_| ServerError::Internal)?;
        let key = Arc::new(LogSigningKey::from_sec1_der(&metadata.private_key_der)?);

        let mut cache = self.cache.write().expect("key cache lock poisoned");
        // Another thread may have parsed the same record first; keep one copy.
        let entry = cache.entry(log_key).or_insert_with(|| Arc::clone(&key));
        Ok(Arc::clone(entry))
    }
}
