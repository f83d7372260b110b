//! `POST /dataset/{logname}/ct/v1/add-objecthash`
//!
//! The one write path. The submission validator authenticates the caller and
//! constructs the leaf; the handler then:
//!
//! 1. answers replayed dup keys from the SCT index, byte-identically
//! 2. stamps the leaf with the current time and appends it to the tree
//! 3. ensures the log's signing key exists (the only place creation happens)
//! 4. signs the RFC 6962 SCT input and persists it first-writer-wins
//!
//! Two racing submissions of one hash may both append a leaf; only one SCT
//! survives, and both callers receive it. Duplicate leaves are harmless to
//! auditors — the invariant is one SCT per hash, not one leaf per hash.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;

use super::add_chain_response;
use crate::error::ServerError;
use crate::now_ms;
use crate::state::AppState;
use crate::storage::LeafData;
use tablelog_core::api::AddChainResponse;
use tablelog_core::records::AddResponse;
use tablelog_core::rfc6962::sct_signature_input;

/// Accepts a submission and returns its SCT.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AddChainResponse>, ServerError> {
    let log = state.log_ref(&logname)?;
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let submission = state.validator().validate(&log, authorization, &body)?;

    let ns = log.ctlog_namespace()?;
    if let Some(existing) = state.index().get_sct(&ns, &submission.dup_key)? {
        // Replay: the key must exist, since an SCT was issued.
        let key = state.keys().get(&log, false)?;
        return Ok(Json(add_chain_response(&key, &existing)));
    }

    let timestamp = now_ms();
    let mut leaf = submission.leaf;
    leaf.timestamp = timestamp;
    let leaf_input = leaf.encode().map_err(|_| ServerError::Internal)?;

    state.log_store().add(
        &log.log_namespace()?,
        &LeafData {
            leaf_input,
            extra_data: submission.extra_data,
        },
    )?;

    let key = state.keys().get(&log, true)?;

    let input = sct_signature_input(timestamp, &leaf).map_err(|_| ServerError::Internal)?;
    let signature = key
        .sign(&input)
        .encode()
        .map_err(|_| ServerError::Internal)?;
    let record = AddResponse {
        signature,
        timestamp: i64::try_from(timestamp).unwrap_or(0),
    };

    let winner = state
        .index()
        .put_sct_if_absent(&ns, &submission.dup_key, &record)?;
    Ok(Json(add_chain_response(&key, &winner)))
}
