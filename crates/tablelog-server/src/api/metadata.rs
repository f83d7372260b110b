//! `GET /dataset/{logname}/ct/v1/metadata`

use axum::extract::{Path, State};
use axum::Json;

use super::existing_log;
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::MetadataResponse;

/// Returns the log's SPKI DER public key.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
) -> Result<Json<MetadataResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let key = state.keys().get(&log, false)?;
    Ok(Json(MetadataResponse {
        key: key.public_key_der().to_vec(),
    }))
}
