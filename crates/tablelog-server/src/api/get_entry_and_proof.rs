//! `GET /dataset/{logname}/ct/v1/get-entry-and-proof?tree_size=N&leaf_index=I`

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, require_u64};
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::GetEntryAndProofResponse;

/// Returns one leaf together with its inclusion proof.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntryAndProofResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let tree_size = require_u64(&params, "tree_size")?;
    let leaf_index = require_u64(&params, "leaf_index")?;

    let ns = log.log_namespace()?;
    let proof = state
        .log_store()
        .inclusion_proof_by_index(&ns, tree_size, leaf_index)?;
    let entry = state.log_store().entry(&ns, leaf_index)?;

    Ok(Json(GetEntryAndProofResponse {
        leaf_input: entry.leaf_input,
        extra_data: entry.extra_data,
        audit_path: proof.audit_path.into_iter().map(|h| h.to_vec()).collect(),
    }))
}
