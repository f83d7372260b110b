//! Router assembly, CORS and path conveniences.
//!
//! The API carries no cookies and no browser-ambient auth, so any origin may
//! read it: CORS allows `GET`/`OPTIONS` from `*` with `Accept` and
//! `Content-Type` headers. Preflights succeed on every path.

use axum::extract::Path;
use axum::http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use axum::http::{Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::state::AppState;

/// Builds the complete REST router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    Router::new()
        .route(
            "/dataset/:logname/ct/v1/metadata",
            get(api::metadata::handle),
        )
        .route(
            "/dataset/:logname/ct/v1/add-objecthash",
            post(api::add_objecthash::handle),
        )
        .route(
            "/dataset/:logname/ct/v1/get-objecthash",
            get(api::get_objecthash::handle),
        )
        .route("/dataset/:logname/ct/v1/get-sth", get(api::get_sth::handle))
        .route(
            "/dataset/:logname/ct/v1/get-sth-consistency",
            get(api::get_sth_consistency::handle),
        )
        .route(
            "/dataset/:logname/ct/v1/get-proof-by-hash",
            get(api::get_proof_by_hash::handle),
        )
        .route(
            "/dataset/:logname/ct/v1/get-entries",
            get(api::get_entries::handle),
        )
        .route(
            "/dataset/:logname/ct/v1/get-entry-and-proof",
            get(api::get_entry_and_proof::handle),
        )
        // Convenience redirect onto the canonical trailing-slash form.
        .route(
            "/dataset/:logname",
            get(|Path(logname): Path<String>| async move {
                (
                    StatusCode::MOVED_PERMANENTLY,
                    [(LOCATION, format!("/dataset/{logname}/"))],
                )
            }),
        )
        .fallback(fallback)
        .layer(cors)
        .with_state(state)
}

/// Preflights succeed anywhere; anything else unrouted is a 404.
async fn fallback(method: Method) -> StatusCode {
    if method == Method::OPTIONS {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}
