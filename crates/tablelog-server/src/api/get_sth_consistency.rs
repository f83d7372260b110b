//! `GET /dataset/{logname}/ct/v1/get-sth-consistency?first=N&second=M`

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, require_u64};
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::GetSthConsistencyResponse;

/// Returns the consistency path between two tree sizes.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetSthConsistencyResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let first = require_u64(&params, "first")?;
    let second = require_u64(&params, "second")?;

    let proof = state
        .log_store()
        .consistency_proof(&log.log_namespace()?, first, second)?;
    Ok(Json(GetSthConsistencyResponse {
        consistency: proof.into_iter().map(|h| h.to_vec()).collect(),
    }))
}
