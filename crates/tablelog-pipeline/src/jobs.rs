//! The three job kinds and the worker pool that runs them.
//!
//! - [`FETCH_ENTRY_METADATA`] probes the upstream high-water mark for one
//!   resource. It is a periodic singleton: one live row per resource, re-run
//!   every five minutes.
//! - [`FETCH_ENTRIES`] fetches a bounded window and fans out. A range wider
//!   than [`MAX_AT_ONCE`] splits its remainder around the midpoint into two
//!   child jobs, enqueued in the same transaction as the per-record work, so
//!   a crash either keeps the whole expansion or none of it.
//! - [`UPDATE_SCT`] submits one record and writes its SCT back.

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::db::Database;
use crate::error::{JobError, PipelineError};
use crate::queue::{Job, JobQueue};
use crate::rows::json_int_id;
use crate::source::SourceClient;
use crate::submitter::LogSubmitter;
use tablelog_core::table_name::TableNameValidator;

/// Job kind: upstream high-water-mark probe.
pub const FETCH_ENTRY_METADATA: &str = "fetch_entry_metadata";
/// Job kind: bounded window fetch.
pub const FETCH_ENTRIES: &str = "fetch_entries";
/// Job kind: per-record submission.
pub const UPDATE_SCT: &str = "update_sct";

/// Most rows fetched (and records enqueued) by one `fetch_entries` run.
pub const MAX_AT_ONCE: i64 = 100;

/// Re-run period of the metadata probe, seconds.
pub const METADATA_PROBE_PERIOD_SECS: i64 = 5 * 60;

/// Arguments of [`FETCH_ENTRY_METADATA`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceArgs {
    /// Upstream resource (table) to probe.
    pub resource: String,
}

/// Arguments of [`FETCH_ENTRIES`]; both bounds inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchEntriesArgs {
    /// Upstream resource (table) to fetch from.
    pub resource: String,
    /// First `_id` to fetch.
    pub start: i64,
    /// Last `_id` to fetch.
    pub end: i64,
}

/// Arguments of [`UPDATE_SCT`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRecordArgs {
    /// Canonical table the record belongs to.
    pub table: String,
    /// The record as fetched upstream.
    pub data: Map<String, Value>,
}

/// Everything the job handlers need.
pub struct PipelineContext {
    /// The durable queue.
    pub queue: JobQueue,
    /// Local relational store (cursor, data tables).
    pub db: Database,
    /// Upstream source.
    pub source: SourceClient,
    /// Log submitter.
    pub submitter: LogSubmitter,
    /// Resource name policy.
    pub table_names: TableNameValidator,
}

impl PipelineContext {
    /// Dispatches one claimed job to its handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's outcome.
    pub async fn run_job(&self, job: &Job) -> Result<(), JobError> {
        match job.job_type.as_str() {
            FETCH_ENTRY_METADATA => self.fetch_entry_metadata(job).await,
            FETCH_ENTRIES => self.fetch_entries(job).await,
            UPDATE_SCT => self.update_sct(job).await,
            other => Err(JobError::Failed(PipelineError::InvalidJob(format!(
                "unknown job type {other}"
            )))),
        }
    }

    /// The re-run period for a job kind; probes are periodic singletons.
    #[must_use]
    pub fn period_secs(job_type: &str) -> Option<i64> {
        (job_type == FETCH_ENTRY_METADATA).then_some(METADATA_PROBE_PERIOD_SECS)
    }

    async fn fetch_entry_metadata(&self, job: &Job) -> Result<(), JobError> {
        let args: ResourceArgs = job.decode_args()?;
        let resource = self
            .table_names
            .validate_and_canonicalise(&args.resource)
            .map_err(PipelineError::from)?;

        // First sighting of a resource: seed the cursor, then run again with
        // the row in place.
        let seeded = self.db.with_immediate_tx(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT last_id FROM processed_ids WHERE resource = ?1",
                    rusqlite::params![resource],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_none() {
                tx.execute(
                    "INSERT INTO processed_ids (resource, last_id) VALUES (?1, 0)",
                    rusqlite::params![resource],
                )?;
                return Ok(false);
            }
            Ok(true)
        })?;
        if !seeded {
            return Err(JobError::ImmediateReschedule);
        }

        let max_id = self.source.max_id(&resource).await?;

        // Cursor read, fetch enqueue and cursor advance commit together.
        self.db.with_immediate_tx(|tx| {
            let last_id: i64 = tx.query_row(
                "SELECT last_id FROM processed_ids WHERE resource = ?1",
                rusqlite::params![resource],
                |row| row.get(0),
            )?;
            if max_id <= last_id {
                return Ok(());
            }
            self.queue.enqueue_in_tx(
                tx,
                FETCH_ENTRIES,
                &FetchEntriesArgs {
                    resource: resource.clone(),
                    start: last_id + 1,
                    end: max_id,
                },
            )?;
            tx.execute(
                "UPDATE processed_ids SET last_id = ?2 WHERE resource = ?1",
                rusqlite::params![resource, max_id],
            )?;
            tracing::info!(%resource, last_id, max_id, "scheduled fetch of new rows");
            Ok(())
        })?;
        Ok(())
    }

    async fn fetch_entries(&self, job: &Job) -> Result<(), JobError> {
        let args: FetchEntriesArgs = job.decode_args()?;
        let resource = self
            .table_names
            .validate_and_canonicalise(&args.resource)
            .map_err(PipelineError::from)?;

        let desired_end = args.end.min(args.start + MAX_AT_ONCE);
        let records = self
            .source
            .fetch_window(&resource, args.start, desired_end)
            .await?;

        self.db.with_immediate_tx(|tx| {
            // Balanced expansion of whatever this run did not cover.
            if desired_end < args.end {
                let midpoint = (args.end + desired_end) / 2;
                let first_half = FetchEntriesArgs {
                    resource: resource.clone(),
                    start: desired_end + 1,
                    end: midpoint,
                };
                if first_half.start <= first_half.end && first_half.end <= args.end {
                    self.queue.enqueue_in_tx(tx, FETCH_ENTRIES, &first_half)?;
                }
                let second_half = FetchEntriesArgs {
                    resource: resource.clone(),
                    start: midpoint + 1,
                    end: args.end,
                };
                if second_half.start <= second_half.end {
                    self.queue.enqueue_in_tx(tx, FETCH_ENTRIES, &second_half)?;
                }
            }

            for record in &records {
                // Records without a usable _id cannot be written back; skip
                // them here rather than poisoning the queue.
                if json_int_id(record).is_err() {
                    tracing::warn!(%resource, "skipping record without integral _id");
                    continue;
                }
                self.queue.enqueue_in_tx(
                    tx,
                    UPDATE_SCT,
                    &SubmitRecordArgs {
                        table: resource.clone(),
                        data: record.clone(),
                    },
                )?;
            }
            Ok(())
        })?;
        tracing::debug!(%resource, start = args.start, end = desired_end, fetched = records.len(), "window fetched");
        Ok(())
    }

    async fn update_sct(&self, job: &Job) -> Result<(), JobError> {
        let args: SubmitRecordArgs = job.decode_args()?;
        self.submitter
            .submit_and_update_record(&args.table, &args.data, Some(&self.db))
            .await?;
        Ok(())
    }
}

/// Runs `worker_count` workers until `shutdown` flips to `true`.
///
/// Each worker claims one job at a time; an empty queue polls with a short
/// nap. Failures are recorded with backoff; [`JobError::ImmediateReschedule`]
/// releases the job untouched.
pub async fn run_workers(
    ctx: std::sync::Arc<PipelineContext>,
    worker_count: usize,
    shutdown: watch::Receiver<bool>,
) {
    let mut handles = Vec::with_capacity(worker_count);
    for worker in 0..worker_count {
        let ctx = std::sync::Arc::clone(&ctx);
        let mut shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                match ctx.queue.claim() {
                    Ok(Some(job)) => run_one(&ctx, &job).await,
                    Ok(None) => {
                        tokio::select! {
                            () = tokio::time::sleep(std::time::Duration::from_millis(250)) => {},
                            _ = shutdown.changed() => {},
                        }
                    },
                    Err(err) => {
                        tracing::error!(worker, error = %err, "queue claim failed");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    },
                }
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }
}

async fn run_one(ctx: &PipelineContext, job: &Job) {
    let outcome = ctx.run_job(job).await;
    let settle = match outcome {
        Ok(()) => ctx
            .queue
            .complete(job, PipelineContext::period_secs(&job.job_type)),
        Err(JobError::ImmediateReschedule) => ctx.queue.release_immediate(job),
        Err(JobError::Failed(err)) => {
            tracing::warn!(job = %job.job_type, id = job.id, error = %err, "job failed");
            ctx.queue.fail(job, &err.to_string())
        },
    };
    if let Err(err) = settle {
        tracing::error!(job = %job.job_type, id = job.id, error = %err, "could not settle job");
    }
}
