//! Pipeline error types.

use thiserror::Error;

/// Errors raised inside pipeline jobs and their collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Local database failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The upstream source misbehaved.
    #[error("upstream source error: {0}")]
    Source(String),

    /// The log server or transport failed.
    #[error("log client error: {0}")]
    Log(#[from] tablelog_client::ClientError),

    /// A record could not be canonicalised or hashed.
    #[error("canonicalisation error: {0}")]
    Canonical(#[from] tablelog_core::objecthash::ObjectHashError),

    /// A job carried arguments that do not decode.
    #[error("invalid job arguments: {0}")]
    InvalidJob(String),

    /// The resource name failed validation.
    #[error(transparent)]
    TableName(#[from] tablelog_core::table_name::TableNameError),

    /// A record violated the row contract (missing or non-integral `_id`,
    /// ambiguous matches).
    #[error("bad record: {0}")]
    BadRecord(String),
}

/// The outcome a job hands back to the worker.
#[derive(Debug, Error)]
pub enum JobError {
    /// Requeue the job immediately; not a failure, the error count stays
    /// untouched. Used when a job discovers it must run again after
    /// committing preparatory state.
    #[error("reschedule immediately")]
    ImmediateReschedule,

    /// The job failed; the queue retries with backoff.
    #[error(transparent)]
    Failed(#[from] PipelineError),
}

impl From<rusqlite::Error> for JobError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Failed(err.into())
    }
}
