//! Client error types.

use thiserror::Error;

/// Errors raised by log clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request could not be completed.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response decoded but violated the wire contract.
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),

    /// A signature on a response failed verification.
    #[error(transparent)]
    Verification(#[from] tablelog_core::verifier::VerifyError),
}

impl ClientError {
    /// True when the server reported 404 — the log, hash or size is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}
