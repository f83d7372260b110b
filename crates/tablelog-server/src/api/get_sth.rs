//! `GET /dataset/{logname}/ct/v1/get-sth[?tree_size=N]`
//!
//! The first observation of each tree size signs and freezes an STH; later
//! requests at the same size return the stored bytes, so independent
//! observers can compare signatures byte for byte.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, optional_u64};
use crate::error::ServerError;
use crate::now_ms;
use crate::state::AppState;
use tablelog_core::api::GetSthResponse;
use tablelog_core::records::SignedTreeHead;
use tablelog_core::rfc6962::sth_signature_input;

/// Returns the signed tree head at the requested (or current) size.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetSthResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let requested = optional_u64(&params, "tree_size")?;

    let head = state.log_store().tree_head(&log.log_namespace()?, requested)?;
    let ns = log.ctlog_namespace()?;

    if let Some(frozen) = state.index().get_sth(&ns, head.tree_size)? {
        return Ok(Json(response_from(&frozen)));
    }

    let key = state.keys().get(&log, false)?;
    let timestamp = now_ms();
    let input = sth_signature_input(timestamp, head.tree_size, &head.root_hash);
    let signature = key
        .sign(&input)
        .encode()
        .map_err(|_| ServerError::Internal)?;

    let record = SignedTreeHead {
        tree_size: head.tree_size,
        timestamp: i64::try_from(timestamp).unwrap_or(0),
        sha256_root_hash: head.root_hash.to_vec(),
        tree_head_signature: signature,
    };
    // First writer freezes the timestamp and signature for this size.
    let winner = state.index().put_sth_if_absent(&ns, &record)?;
    Ok(Json(response_from(&winner)))
}

fn response_from(record: &SignedTreeHead) -> GetSthResponse {
    GetSthResponse {
        tree_size: record.tree_size,
        timestamp: u64::try_from(record.timestamp).unwrap_or(0),
        sha256_root_hash: record.sha256_root_hash.clone(),
        tree_head_signature: record.tree_head_signature.clone(),
    }
}
