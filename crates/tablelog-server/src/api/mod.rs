//! REST endpoint handlers, one module per endpoint.
//!
//! Every handler starts by validating the log name from the path. Read
//! handlers then pass the existence gate: a signing-key lookup with
//! `create = false`, which turns reads against never-written logs into 404s
//! instead of letting them provision empty storage namespaces. Only
//! `add-objecthash` may create.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::ServerError;
use crate::identity::LogRef;
use crate::state::AppState;
use tablelog_core::api::AddChainResponse;
use tablelog_core::crypto::LogSigningKey;
use tablelog_core::records::AddResponse;
use tablelog_core::rfc6962::V1;

pub mod add_objecthash;
pub mod get_entries;
pub mod get_entry_and_proof;
pub mod get_objecthash;
pub mod get_proof_by_hash;
pub mod get_sth;
pub mod get_sth_consistency;
pub mod metadata;

/// Parses a required unsigned integer query parameter.
fn require_u64(params: &HashMap<String, String>, name: &str) -> Result<u64, ServerError> {
    params
        .get(name)
        .and_then(|raw| raw.parse().ok())
        .ok_or(ServerError::InvalidRequest)
}

/// Parses an optional unsigned integer query parameter; a present-but-bad
/// value is an error.
fn optional_u64(params: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ServerError> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ServerError::InvalidRequest),
    }
}

/// Parses a required base64 query parameter.
fn require_base64(params: &HashMap<String, String>, name: &str) -> Result<Vec<u8>, ServerError> {
    let raw = params.get(name).ok_or(ServerError::InvalidRequest)?;
    BASE64.decode(raw).map_err(|_| ServerError::InvalidRequest)
}

/// The read-mode existence gate: resolves the log and requires that it has a
/// signing key already.
fn existing_log(state: &AppState, raw_name: &str) -> Result<LogRef, ServerError> {
    let log = state.log_ref(raw_name)?;
    state.keys().get(&log, false)?;
    Ok(log)
}

/// Assembles the wire response for an issued SCT.
fn add_chain_response(key: &LogSigningKey, sct: &AddResponse) -> AddChainResponse {
    AddChainResponse {
        sct_version: V1,
        id: key.log_id().to_vec(),
        timestamp: u64::try_from(sct.timestamp).unwrap_or(0),
        extensions: String::new(),
        signature: sct.signature.clone(),
    }
}

/// Looks up a previously issued SCT by object hash and renders the response.
fn find_sct(
    state: &AppState,
    log: &LogRef,
    object_hash: &[u8],
) -> Result<AddChainResponse, ServerError> {
    let ns = log.ctlog_namespace()?;
    let sct = state
        .index()
        .get_sct(&ns, object_hash)?
        .ok_or(ServerError::NotFound)?;
    let key = state.keys().get(log, false)?;
    Ok(add_chain_response(&key, &sct))
}
