//! The pipeline's local relational store.
//!
//! One `SQLite` database holds the job queue, the `processed_ids` cursor and
//! the mirrored data tables that receive SCT write-backs. Multi-step writes
//! run inside immediate transactions, which take the write lock up front and
//! so serialise concurrent workers the way the original deployment used row
//! locks.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::PipelineError;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Shared handle to the pipeline database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Creates an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, PipelineError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PipelineError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Locks the underlying connection for direct queries.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Runs `f` inside an immediate transaction, committing on `Ok`.
    ///
    /// # Errors
    ///
    /// Propagates `f`'s error after rolling back, or the commit failure.
    pub fn with_immediate_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_commits_on_ok() {
        let db = Database::in_memory().unwrap();
        db.with_immediate_tx(|tx| {
            tx.execute(
                "INSERT INTO processed_ids (resource, last_id) VALUES ('r', 5)",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let last: i64 = db
            .lock()
            .query_row(
                "SELECT last_id FROM processed_ids WHERE resource = 'r'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(last, 5);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), PipelineError> = db.with_immediate_tx(|tx| {
            tx.execute(
                "INSERT INTO processed_ids (resource, last_id) VALUES ('r', 5)",
                [],
            )?;
            Err(PipelineError::BadRecord("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM processed_ids", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
