//! # tablelog-pipeline
//!
//! Durable submission pipeline: pulls records from an upstream tabular
//! source, canonicalises and hashes them, submits each hash to a verifiable
//! log, and writes the returned SCT back to the originating row.
//!
//! Work is organised as three job kinds in a relational job queue:
//!
//! - `fetch_entry_metadata` — a per-resource singleton that probes the
//!   upstream `MAX(_id)` and enqueues a fetch for anything new, advancing the
//!   monotone `processed_ids` cursor in the same transaction
//! - `fetch_entries` — fetches a bounded window of rows, recursively
//!   splitting oversized ranges into balanced halves, and enqueues one
//!   `update_sct` per record
//! - `update_sct` — canonicalise, hash, submit, verify, write back under
//!   optimistic concurrency
//!
//! Every job either completes, fails (and retries with backoff), or yields
//! with [`JobError::ImmediateReschedule`] — a distinguished non-failure that
//! requeues the job without touching its error count.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod rows;
pub mod source;
pub mod submitter;

pub use config::PipelineConfig;
pub use error::{JobError, PipelineError};
