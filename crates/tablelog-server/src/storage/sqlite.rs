//! `SQLite`-backed storage collaborator.
//!
//! One database holds both capability sets: the `kv` table backs
//! [`StorageReader`]/[`StorageWriter`], and the `leaves` table backs
//! [`VerifiableLog`]. WAL mode allows concurrent reads while a write is in
//! progress; every multi-step write runs inside an immediate transaction so
//! the read-recheck-write guard of `put_if_absent` and the index assignment
//! of `add` are serialised.
//!
//! Proof construction loads the leaf-hash prefix of the namespace and
//! delegates the tree math to `tablelog_core::merkle`; the leaf sequence is
//! append-only, so a prefix read at size `n` is stable forever.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{
    InclusionProof, LeafData, Namespace, StorageError, StorageReader, StorageWriter, TreeHead,
    VerifiableLog,
};
use tablelog_core::merkle;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// The `SQLite`-backed store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("storage mutex poisoned")
    }

    /// Loads the first `size` leaf hashes of a namespace.
    fn leaf_hashes(
        conn: &Connection,
        ns: &Namespace,
        size: u64,
    ) -> Result<Vec<[u8; 32]>, StorageError> {
        let mut stmt = conn.prepare_cached(
            "SELECT leaf_hash FROM leaves WHERE ns = ?1 AND leaf_index < ?2 ORDER BY leaf_index",
        )?;
        let rows = stmt.query_map(params![ns.as_slice(), size], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;
        let mut hashes = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        for row in rows {
            let bytes = row?;
            let hash: [u8; 32] = bytes
                .try_into()
                .map_err(|_| StorageError::Corrupt("leaf hash is not 32 bytes".into()))?;
            hashes.push(hash);
        }
        Ok(hashes)
    }

    fn leaf_count(conn: &Connection, ns: &Namespace) -> Result<u64, StorageError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM leaves WHERE ns = ?1",
            params![ns.as_slice()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Resolves a requested size against the head, checking bounds.
    fn bounded_size(
        conn: &Connection,
        ns: &Namespace,
        size: Option<u64>,
    ) -> Result<u64, StorageError> {
        let head = Self::leaf_count(conn, ns)?;
        match size {
            None => Ok(head),
            Some(s) if s <= head => Ok(s),
            Some(_) => Err(StorageError::InvalidTreeRange),
        }
    }
}

impl StorageReader for SqliteStore {
    fn get(&self, ns: &Namespace, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        let conn = self.lock();
        let value: Option<Vec<u8>> = conn
            .query_row(
                "SELECT value FROM kv WHERE ns = ?1 AND key = ?2",
                params![ns.as_slice(), key],
                |row| row.get(0),
            )
            .optional()?;
        value.ok_or(StorageError::NoSuchKey)
    }
}

impl StorageWriter for SqliteStore {
    fn put_if_absent(
        &self,
        ns: &Namespace,
        key: &[u8],
        value: &[u8],
    ) -> Result<Vec<u8>, StorageError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: Option<Vec<u8>> = tx
            .query_row(
                "SELECT value FROM kv WHERE ns = ?1 AND key = ?2",
                params![ns.as_slice(), key],
                |row| row.get(0),
            )
            .optional()?;
        let winner = match existing {
            Some(current) => current,
            None => {
                tx.execute(
                    "INSERT INTO kv (ns, key, value) VALUES (?1, ?2, ?3)",
                    params![ns.as_slice(), key, value],
                )?;
                value.to_vec()
            },
        };
        tx.commit()?;
        Ok(winner)
    }
}

impl VerifiableLog for SqliteStore {
    fn add(&self, ns: &Namespace, leaf: &LeafData) -> Result<u64, StorageError> {
        let leaf_hash = merkle::leaf_hash(&leaf.leaf_input);
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(leaf_index) + 1, 0) FROM leaves WHERE ns = ?1",
            params![ns.as_slice()],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO leaves (ns, leaf_index, leaf_hash, leaf_input, extra_data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ns.as_slice(),
                next,
                leaf_hash.as_slice(),
                leaf.leaf_input,
                leaf.extra_data
            ],
        )?;
        tx.commit()?;
        Ok(u64::try_from(next).unwrap_or(0))
    }

    fn tree_head(&self, ns: &Namespace, size: Option<u64>) -> Result<TreeHead, StorageError> {
        let conn = self.lock();
        let tree_size = Self::bounded_size(&conn, ns, size)?;
        let hashes = Self::leaf_hashes(&conn, ns, tree_size)?;
        Ok(TreeHead {
            tree_size,
            root_hash: merkle::root_hash(&hashes),
        })
    }

    fn inclusion_proof(
        &self,
        ns: &Namespace,
        tree_size: u64,
        leaf_hash: &[u8; 32],
    ) -> Result<InclusionProof, StorageError> {
        let conn = self.lock();
        let bounded = Self::bounded_size(&conn, ns, Some(tree_size))?;
        let index: Option<i64> = conn
            .query_row(
                "SELECT leaf_index FROM leaves
                 WHERE ns = ?1 AND leaf_hash = ?2 AND leaf_index < ?3
                 ORDER BY leaf_index LIMIT 1",
                params![ns.as_slice(), leaf_hash.as_slice(), bounded],
                |row| row.get(0),
            )
            .optional()?;
        let index = index.ok_or(StorageError::NotFound)?;
        let leaf_index = u64::try_from(index).unwrap_or(0);

        let hashes = Self::leaf_hashes(&conn, ns, bounded)?;
        let path = merkle::inclusion_path(usize::try_from(leaf_index).unwrap_or(0), &hashes)
            .ok_or(StorageError::NotFound)?;
        Ok(InclusionProof {
            leaf_index,
            audit_path: path,
        })
    }

    fn inclusion_proof_by_index(
        &self,
        ns: &Namespace,
        tree_size: u64,
        leaf_index: u64,
    ) -> Result<InclusionProof, StorageError> {
        let conn = self.lock();
        let bounded = Self::bounded_size(&conn, ns, Some(tree_size))?;
        if leaf_index >= bounded {
            return Err(StorageError::NotFound);
        }
        let hashes = Self::leaf_hashes(&conn, ns, bounded)?;
        let path = merkle::inclusion_path(usize::try_from(leaf_index).unwrap_or(0), &hashes)
            .ok_or(StorageError::NotFound)?;
        Ok(InclusionProof {
            leaf_index,
            audit_path: path,
        })
    }

    fn consistency_proof(
        &self,
        ns: &Namespace,
        first: u64,
        second: u64,
    ) -> Result<Vec<[u8; 32]>, StorageError> {
        let conn = self.lock();
        let head = Self::leaf_count(&conn, ns)?;
        if first == 0 || first > second || second > head {
            return Err(StorageError::InvalidRange);
        }
        let hashes = Self::leaf_hashes(&conn, ns, second)?;
        merkle::consistency_path(usize::try_from(first).unwrap_or(0), &hashes)
            .ok_or(StorageError::InvalidRange)
    }

    fn entries(
        &self,
        ns: &Namespace,
        start: u64,
        end_exclusive: u64,
    ) -> Result<Vec<LeafData>, StorageError> {
        if end_exclusive <= start {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT leaf_input, extra_data FROM leaves
             WHERE ns = ?1 AND leaf_index >= ?2 AND leaf_index < ?3
             ORDER BY leaf_index",
        )?;
        let rows = stmt.query_map(params![ns.as_slice(), start, end_exclusive], |row| {
            Ok(LeafData {
                leaf_input: row.get(0)?,
                extra_data: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn entry(&self, ns: &Namespace, index: u64) -> Result<LeafData, StorageError> {
        let conn = self.lock();
        conn.query_row(
            "SELECT leaf_input, extra_data FROM leaves WHERE ns = ?1 AND leaf_index = ?2",
            params![ns.as_slice(), index],
            |row| {
                Ok(LeafData {
                    leaf_input: row.get(0)?,
                    extra_data: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or(StorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn ns(byte: u8) -> Namespace {
        [byte; 32]
    }

    fn leaf(n: u8) -> LeafData {
        LeafData {
            leaf_input: vec![n; 16],
            extra_data: format!("{{\"n\":{n}}}").into_bytes(),
        }
    }

    #[test]
    fn get_missing_key_is_no_such_key() {
        let s = store();
        assert!(matches!(
            s.get(&ns(1), b"absent"),
            Err(StorageError::NoSuchKey)
        ));
    }

    #[test]
    fn put_if_absent_first_writer_wins() {
        let s = store();
        let first = s.put_if_absent(&ns(1), b"k", b"original").unwrap();
        assert_eq!(first, b"original");

        // A later writer gets the original back, not its own value.
        let second = s.put_if_absent(&ns(1), b"k", b"challenger").unwrap();
        assert_eq!(second, b"original");
        assert_eq!(s.get(&ns(1), b"k").unwrap(), b"original");
    }

    #[test]
    fn namespaces_are_isolated() {
        let s = store();
        s.put_if_absent(&ns(1), b"k", b"one").unwrap();
        s.put_if_absent(&ns(2), b"k", b"two").unwrap();
        assert_eq!(s.get(&ns(1), b"k").unwrap(), b"one");
        assert_eq!(s.get(&ns(2), b"k").unwrap(), b"two");
    }

    #[test]
    fn add_assigns_sequential_indexes_per_namespace() {
        let s = store();
        assert_eq!(s.add(&ns(1), &leaf(0)).unwrap(), 0);
        assert_eq!(s.add(&ns(1), &leaf(1)).unwrap(), 1);
        assert_eq!(s.add(&ns(2), &leaf(9)).unwrap(), 0);
    }

    #[test]
    fn tree_head_of_empty_log_is_size_zero() {
        let s = store();
        let head = s.tree_head(&ns(1), None).unwrap();
        assert_eq!(head.tree_size, 0);
        assert_eq!(head.root_hash, merkle::root_hash(&[]));
    }

    #[test]
    fn tree_head_beyond_head_is_invalid_tree_range() {
        let s = store();
        s.add(&ns(1), &leaf(0)).unwrap();
        assert!(matches!(
            s.tree_head(&ns(1), Some(2)),
            Err(StorageError::InvalidTreeRange)
        ));
        // Size zero stays well-defined.
        let head = s.tree_head(&ns(1), Some(0)).unwrap();
        assert_eq!(head.tree_size, 0);
    }

    #[test]
    fn inclusion_proof_round_trips_through_verification() {
        let s = store();
        for n in 0..7u8 {
            s.add(&ns(1), &leaf(n)).unwrap();
        }
        let head = s.tree_head(&ns(1), None).unwrap();

        for n in 0..7u8 {
            let hash = merkle::leaf_hash(&leaf(n).leaf_input);
            let proof = s.inclusion_proof(&ns(1), head.tree_size, &hash).unwrap();
            assert_eq!(proof.leaf_index, u64::from(n));
            assert!(merkle::verify_inclusion(
                &hash,
                proof.leaf_index,
                head.tree_size,
                &proof.audit_path,
                &head.root_hash
            ));
        }
    }

    #[test]
    fn inclusion_proof_for_unknown_hash_is_not_found() {
        let s = store();
        s.add(&ns(1), &leaf(0)).unwrap();
        assert!(matches!(
            s.inclusion_proof(&ns(1), 1, &[0xee; 32]),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn duplicate_leaves_prove_at_their_first_index() {
        let s = store();
        s.add(&ns(1), &leaf(5)).unwrap();
        s.add(&ns(1), &leaf(6)).unwrap();
        s.add(&ns(1), &leaf(5)).unwrap();

        let hash = merkle::leaf_hash(&leaf(5).leaf_input);
        let proof = s.inclusion_proof(&ns(1), 3, &hash).unwrap();
        assert_eq!(proof.leaf_index, 0);
    }

    #[test]
    fn consistency_proof_round_trips_through_verification() {
        let s = store();
        for n in 0..6u8 {
            s.add(&ns(1), &leaf(n)).unwrap();
        }
        let old = s.tree_head(&ns(1), Some(3)).unwrap();
        let new = s.tree_head(&ns(1), None).unwrap();
        let proof = s.consistency_proof(&ns(1), 3, 6).unwrap();
        assert!(merkle::verify_consistency(
            3,
            6,
            &old.root_hash,
            &new.root_hash,
            &proof
        ));
    }

    #[test]
    fn consistency_proof_rejects_bad_bounds() {
        let s = store();
        s.add(&ns(1), &leaf(0)).unwrap();
        assert!(matches!(
            s.consistency_proof(&ns(1), 0, 1),
            Err(StorageError::InvalidRange)
        ));
        assert!(matches!(
            s.consistency_proof(&ns(1), 1, 2),
            Err(StorageError::InvalidRange)
        ));
    }

    #[test]
    fn entries_clamp_to_existing_rows() {
        let s = store();
        for n in 0..3u8 {
            s.add(&ns(1), &leaf(n)).unwrap();
        }
        assert_eq!(s.entries(&ns(1), 0, 100).unwrap().len(), 3);
        assert_eq!(s.entries(&ns(1), 2, 3).unwrap(), vec![leaf(2)]);
        assert!(s.entries(&ns(1), 3, 3).unwrap().is_empty());
        assert!(s.entries(&ns(1), 5, 2).unwrap().is_empty());
    }

    #[test]
    fn entry_fetches_one_leaf() {
        let s = store();
        s.add(&ns(1), &leaf(0)).unwrap();
        assert_eq!(s.entry(&ns(1), 0).unwrap(), leaf(0));
        assert!(matches!(s.entry(&ns(1), 1), Err(StorageError::NotFound)));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let s = SqliteStore::open(&path).unwrap();
            s.add(&ns(1), &leaf(0)).unwrap();
            s.put_if_absent(&ns(1), b"k", b"v").unwrap();
        }
        let s = SqliteStore::open(&path).unwrap();
        assert_eq!(s.tree_head(&ns(1), None).unwrap().tree_size, 1);
        assert_eq!(s.get(&ns(1), b"k").unwrap(), b"v");
    }
}
