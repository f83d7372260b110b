//! Durable job queue over the relational store.
//!
//! Jobs are rows: a kind, JSON arguments, a run-at time and an error count.
//! Workers claim the oldest ready job inside an immediate transaction, run
//! it, and then either delete it (done), release it untouched (immediate
//! reschedule), bump its error count with backoff (failure), or push its
//! run-at forward one period (periodic singletons).
//!
//! Failure backoff follows the classic que shape, `error_count⁴ + 3`
//! seconds, so transient faults retry quickly and repeat offenders drift
//! out of the hot path.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::Database;
use crate::error::PipelineError;

/// A claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Queue row ID.
    pub id: i64,
    /// Job kind, dispatch key.
    pub job_type: String,
    /// JSON-encoded arguments.
    pub args: String,
    /// Failures so far.
    pub error_count: i64,
}

impl Job {
    /// Decodes the job's arguments.
    ///
    /// # Errors
    ///
    /// Returns an error naming the job when the JSON does not fit.
    pub fn decode_args<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_json::from_str(&self.args)
            .map_err(|e| PipelineError::InvalidJob(format!("{}: {e}", self.job_type)))
    }
}

/// The durable queue.
#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    queue_name: String,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl JobQueue {
    /// Creates a queue handle. `queue_name` partitions jobs between worker
    /// deployments sharing one database.
    #[must_use]
    pub fn new(db: Database, queue_name: impl Into<String>) -> Self {
        Self {
            db,
            queue_name: queue_name.into(),
        }
    }

    /// Enqueues a job inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns a database error on insert failure.
    pub fn enqueue_in_tx<A: Serialize>(
        &self,
        tx: &Transaction<'_>,
        job_type: &str,
        args: &A,
    ) -> Result<(), PipelineError> {
        let encoded = serde_json::to_string(args)
            .map_err(|e| PipelineError::InvalidJob(format!("{job_type}: {e}")))?;
        tx.execute(
            "INSERT INTO jobs (queue, job_type, args, run_at) VALUES (?1, ?2, ?3, ?4)",
            params![self.queue_name, job_type, encoded, now()],
        )?;
        Ok(())
    }

    /// Enqueues a job in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns a database error on insert failure.
    pub fn enqueue<A: Serialize>(&self, job_type: &str, args: &A) -> Result<(), PipelineError> {
        self.db
            .with_immediate_tx(|tx| self.enqueue_in_tx(tx, job_type, args))
    }

    /// Enqueues a job unless an identical `(job_type, args)` row already
    /// exists — how periodic singletons are bootstrapped idempotently.
    ///
    /// # Errors
    ///
    /// Returns a database error on insert failure.
    pub fn enqueue_unique<A: Serialize>(
        &self,
        job_type: &str,
        args: &A,
    ) -> Result<bool, PipelineError> {
        let encoded = serde_json::to_string(args)
            .map_err(|e| PipelineError::InvalidJob(format!("{job_type}: {e}")))?;
        self.db.with_immediate_tx(|tx| {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM jobs
                     WHERE queue = ?1 AND job_type = ?2 AND args = ?3
                     LIMIT 1",
                    params![self.queue_name, job_type, encoded],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO jobs (queue, job_type, args, run_at) VALUES (?1, ?2, ?3, ?4)",
                params![self.queue_name, job_type, encoded, now()],
            )?;
            Ok(true)
        })
    }

    /// Claims the oldest ready job, locking it against other workers.
    ///
    /// # Errors
    ///
    /// Returns a database error on claim failure.
    pub fn claim(&self) -> Result<Option<Job>, PipelineError> {
        self.db.with_immediate_tx(|tx| {
            let job: Option<Job> = tx
                .query_row(
                    "SELECT id, job_type, args, error_count FROM jobs
                     WHERE queue = ?1 AND locked = 0 AND run_at <= ?2
                     ORDER BY run_at, id LIMIT 1",
                    params![self.queue_name, now()],
                    |row| {
                        Ok(Job {
                            id: row.get(0)?,
                            job_type: row.get(1)?,
                            args: row.get(2)?,
                            error_count: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            if let Some(job) = &job {
                tx.execute("UPDATE jobs SET locked = 1 WHERE id = ?1", params![job.id])?;
            }
            Ok(job)
        })
    }

    /// Completes a job: deletes it, or — for periodic jobs — pushes it
    /// `period_secs` into the future with a clean error count.
    ///
    /// # Errors
    ///
    /// Returns a database error on update failure.
    pub fn complete(&self, job: &Job, period_secs: Option<i64>) -> Result<(), PipelineError> {
        self.db.with_immediate_tx(|tx| {
            match period_secs {
                None => {
                    tx.execute("DELETE FROM jobs WHERE id = ?1", params![job.id])?;
                },
                Some(period) => {
                    tx.execute(
                        "UPDATE jobs SET locked = 0, run_at = ?2, error_count = 0,
                                         last_error = NULL
                         WHERE id = ?1",
                        params![job.id, now() + period],
                    )?;
                },
            }
            Ok(())
        })
    }

    /// Releases a job for an immediate re-run without recording a failure.
    ///
    /// # Errors
    ///
    /// Returns a database error on update failure.
    pub fn release_immediate(&self, job: &Job) -> Result<(), PipelineError> {
        self.db.with_immediate_tx(|tx| {
            tx.execute(
                "UPDATE jobs SET locked = 0, run_at = ?2 WHERE id = ?1",
                params![job.id, now()],
            )?;
            Ok(())
        })
    }

    /// Records a failure and schedules the retry.
    ///
    /// # Errors
    ///
    /// Returns a database error on update failure.
    pub fn fail(&self, job: &Job, message: &str) -> Result<(), PipelineError> {
        let backoff = backoff_secs(job.error_count + 1);
        self.db.with_immediate_tx(|tx| {
            tx.execute(
                "UPDATE jobs SET locked = 0, run_at = ?2, error_count = error_count + 1,
                                 last_error = ?3
                 WHERE id = ?1",
                params![job.id, now() + backoff, message],
            )?;
            Ok(())
        })
    }

    /// Number of jobs not yet completed, for tests and monitoring.
    ///
    /// # Errors
    ///
    /// Returns a database error on query failure.
    pub fn depth(&self) -> Result<i64, PipelineError> {
        let count = self.db.lock().query_row(
            "SELECT COUNT(*) FROM jobs WHERE queue = ?1",
            params![self.queue_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The database this queue lives in.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

fn backoff_secs(error_count: i64) -> i64 {
    error_count.pow(4) + 3
}
