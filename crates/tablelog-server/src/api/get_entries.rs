//! `GET /dataset/{logname}/ct/v1/get-entries?start=N&end=M`
//!
//! `end` is inclusive on the wire but clamped so no response carries more
//! than [`MAX_ENTRIES`] leaves; clients walk larger ranges in pages. The
//! underlying store is exclusive of its upper bound, hence the `+ 1`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::{existing_log, require_u64};
use crate::error::ServerError;
use crate::state::AppState;
use tablelog_core::api::{GetEntriesResponse, LeafEntry};

/// Upper bound on entries returned in one response.
pub const MAX_ENTRIES: u64 = 100;

/// Returns a page of leaves.
pub async fn handle(
    State(state): State<AppState>,
    Path(logname): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntriesResponse>, ServerError> {
    let log = existing_log(&state, &logname)?;
    let start = require_u64(&params, "start")?;
    let end = require_u64(&params, "end")?;

    let last = start.saturating_add(MAX_ENTRIES - 1);
    let end = end.min(last);

    let leaves =
        state
            .log_store()
            .entries(&log.log_namespace()?, start, end.saturating_add(1))?;
    if leaves.is_empty() {
        // Typically a size sent in wrong.
        return Err(ServerError::InvalidRange);
    }

    Ok(Json(GetEntriesResponse {
        entries: leaves
            .into_iter()
            .map(|leaf| LeafEntry {
                leaf_input: leaf.leaf_input,
                extra_data: leaf.extra_data,
            })
            .collect(),
    }))
}
