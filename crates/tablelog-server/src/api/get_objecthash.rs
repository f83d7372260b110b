//! `GET /dataset/{logname}/ct/v1/get-objecthash?hash=base64`

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, find_sct, require_base64};
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::AddChainResponse;

/// Returns the SCT previously issued for an object hash.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AddChainResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let hash = require_base64(&params, "hash")?;
    Ok(Json(find_sct(&state, &log, &hash)?))
}
