//! Server error taxonomy and HTTP status mapping.
//!
//! Handlers return [`ServerError`]; the `IntoResponse` impl maps each kind to
//! its status code. Storage sentinels convert via `From`, and anything
//! unclassified — database faults, cryptographic failures, encoding bugs —
//! is logged server-side and collapses to [`ServerError::Internal`] so no
//! internal detail reaches a client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by the REST handlers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    /// The request was malformed: bad parameter, undecodable body, invalid
    /// table name.
    #[error("invalid request")]
    InvalidRequest,

    /// The requested entry range is empty or unsatisfiable.
    #[error("invalid range")]
    InvalidRange,

    /// A tree size outside the log's current bounds.
    #[error("invalid tree range")]
    InvalidTreeRange,

    /// The log, hash or tree size does not exist.
    #[error("not found")]
    NotFound,

    /// Authentication or submission validation failed.
    #[error("not authorized")]
    NotAuthorized,

    /// Anything the client must not learn more about.
    #[error("internal error")]
    Internal,
}

impl ServerError {
    /// The HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest | Self::InvalidRange | Self::InvalidTreeRange => {
                StatusCode::BAD_REQUEST
            },
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NoSuchKey | StorageError::NotFound => Self::NotFound,
            StorageError::InvalidRange => Self::InvalidRange,
            StorageError::InvalidTreeRange => Self::InvalidTreeRange,
            StorageError::Database(_) | StorageError::Corrupt(_) => {
                tracing::error!(error = %err, "storage failure");
                Self::Internal
            },
        }
    }
}

impl From<tablelog_core::crypto::CryptoError> for ServerError {
    fn from(_: tablelog_core::crypto::CryptoError) -> Self {
        // Crypto failures are always opaque.
        Self::Internal
    }
}

impl From<tablelog_core::objecthash::ObjectHashError> for ServerError {
    fn from(err: tablelog_core::objecthash::ObjectHashError) -> Self {
        tracing::error!(error = %err, "object hash failure");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ServerError::InvalidRequest.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::InvalidRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::InvalidTreeRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServerError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServerError::NotAuthorized.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_sentinels_map_to_client_errors() {
        assert_eq!(
            ServerError::from(StorageError::NoSuchKey),
            ServerError::NotFound
        );
        assert_eq!(
            ServerError::from(StorageError::NotFound),
            ServerError::NotFound
        );
        assert_eq!(
            ServerError::from(StorageError::InvalidRange),
            ServerError::InvalidRange
        );
        assert_eq!(
            ServerError::from(StorageError::InvalidTreeRange),
            ServerError::InvalidTreeRange
        );
    }

    #[test]
    fn opaque_errors_do_not_leak_detail() {
        let err = ServerError::from(StorageError::Corrupt("sct record truncated".into()));
        assert_eq!(err, ServerError::Internal);
        assert_eq!(err.to_string(), "internal error");
    }
}
