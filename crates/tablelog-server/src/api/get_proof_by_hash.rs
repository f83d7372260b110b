//! `GET /dataset/{logname}/ct/v1/get-proof-by-hash?hash=base64&tree_size=N`

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, require_base64, require_u64};
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::GetProofByHashResponse;

/// Returns the inclusion proof for a leaf hash at a tree size.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetProofByHashResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let tree_size = require_u64(&params, "tree_size")?;
    let hash = require_base64(&params, "hash")?;
    let leaf_hash: [u8; 32] = hash
        .as_slice()
        .try_into()
        .map_err(|_| ServerError::InvalidRequest)?;

    let proof =
        state
            .log_store()
            .inclusion_proof(&log.log_namespace()?, tree_size, &leaf_hash)?;
    Ok(Json(GetProofByHashResponse {
        leaf_index: proof.leaf_index,
        audit_path: proof.audit_path.into_iter().map(|h| h.to_vec()).collect(),
    }))
}
