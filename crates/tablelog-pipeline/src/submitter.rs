//! Submission of records to logs and SCT write-back.
//!
//! [`LogSubmitter`] owns one log client per table and drives the
//! `update_sct` path:
//!
//! 1. canonicalise and hash the record
//! 2. if the row already carries an SCT that verifies for that hash, stop —
//!    this is what makes replays free and lets the write-back safely
//!    retrigger whatever change feeds the pipeline
//! 3. submit the hash, receive the SCT
//! 4. re-read the row inside an immediate transaction, recompute its hash,
//!    and only stamp the SCT column if the row still hashes to what was
//!    submitted and the column text would actually change
//!
//! The committed invariant: `signed_certificate_timestamp` always attests to
//! the exact bytes currently in the row, or is absent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};

use crate::db::Database;
use crate::error::PipelineError;
use crate::rows::{json_int_id, read_row};
use tablelog_client::{AddClient, LogClient};
use tablelog_core::canonical::{filter_and_hash, SCT_COLUMN};
use tablelog_core::rfc6962::{MerkleTreeLeaf, SignedCertificateTimestamp};
use tablelog_core::table_name::TableNameValidator;

/// Submits records to per-table logs and writes SCTs back.
pub struct LogSubmitter {
    /// Base URL of the log server.
    server: String,
    /// Write key for `add-objecthash`.
    api_key: String,
    table_names: TableNameValidator,
    clients: Mutex<HashMap<String, Arc<LogClient>>>,
}

impl LogSubmitter {
    /// Creates a submitter against the log server at `server`.
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        api_key: impl Into<String>,
        table_names: TableNameValidator,
    ) -> Self {
        Self {
            server: server.into(),
            api_key: api_key.into(),
            table_names,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The client for a canonical table name, created on first use.
    fn log_client(&self, canonical_table: &str) -> Arc<LogClient> {
        let mut clients = self.clients.lock().expect("client cache lock poisoned");
        Arc::clone(clients.entry(canonical_table.to_owned()).or_insert_with(|| {
            Arc::new(LogClient::new(
                format!("{}/dataset/{canonical_table}", self.server),
                self.api_key.clone(),
            ))
        }))
    }

    /// Verifies that `sct_base64` is this log's valid promise for `hash`.
    async fn verify_existing_sct(
        &self,
        canonical_table: &str,
        sct_base64: &str,
        hash: [u8; 32],
    ) -> Result<(), PipelineError> {
        let bytes = BASE64
            .decode(sct_base64)
            .map_err(|e| PipelineError::BadRecord(format!("stored SCT is not base64: {e}")))?;
        // Exact decode: trailing bytes are rejected.
        let sct = SignedCertificateTimestamp::decode(&bytes)
            .map_err(|e| PipelineError::BadRecord(format!("stored SCT undecodable: {e}")))?;

        let verifier = self.log_client(canonical_table).verifier().await?;
        let leaf = MerkleTreeLeaf::object_hash(hash, sct.timestamp);
        verifier
            .verify_sct(&sct, &leaf)
            .map_err(|e| PipelineError::BadRecord(format!("stored SCT invalid: {e}")))?;
        Ok(())
    }

    /// Submits `record` to its table's log and, when `db` is given, writes
    /// the SCT back to the originating row. A record whose current SCT
    /// already verifies is a no-op end to end.
    ///
    /// # Errors
    ///
    /// Returns an error on validation, transport or database failure.
    pub async fn submit_and_update_record(
        &self,
        table: &str,
        record: &Map<String, Value>,
        db: Option<&Database>,
    ) -> Result<(), PipelineError> {
        let id = json_int_id(record)?;
        let (data_to_send, hash) = filter_and_hash(record)?;
        let canonical = self.table_names.validate_and_canonicalise(table)?;

        if let Some(current) = record.get(SCT_COLUMN).and_then(Value::as_str) {
            if !current.is_empty()
                && self
                    .verify_existing_sct(&canonical, current, hash)
                    .await
                    .is_ok()
            {
                // Already promised for exactly these bytes.
                return Ok(());
            }
        }

        let client = self.log_client(&canonical);
        let (sct, _) = client
            .add_object_hash(hash, &Value::Object(data_to_send))
            .await?;
        tracing::debug!(table = %canonical, id, "received SCT");

        let Some(db) = db else {
            return Ok(());
        };

        let encoded = sct
            .encode()
            .map_err(|e| PipelineError::BadRecord(format!("SCT unencodable: {e}")))?;
        let sct_text = BASE64.encode(encoded);

        db.with_immediate_tx(|tx| {
            // The row may have changed, vanished or been stamped since.
            let Some(current_row) = read_row(tx, &canonical, id)? else {
                return Ok(());
            };
            let (_, fresh_hash) = filter_and_hash(&current_row)?;
            if fresh_hash != hash {
                // Changed since submission; a later run will re-submit.
                return Ok(());
            }
            if current_row.get(SCT_COLUMN).and_then(Value::as_str) == Some(sct_text.as_str()) {
                return Ok(());
            }
            tx.execute(
                &format!(r#"UPDATE "{canonical}" SET {SCT_COLUMN} = ?1 WHERE _id = ?2"#),
                rusqlite::params![sct_text, id],
            )?;
            tracing::info!(table = %canonical, id, "wrote SCT back");
            Ok(())
        })
    }
}
