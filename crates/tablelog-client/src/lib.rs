//! # tablelog-client
//!
//! Client library for talking to a tablelog verifiable log server.
//!
//! A [`LogClient`] wraps one log's base URL and exposes two capability sets:
//!
//! - [`AddClient`]: submits object hashes with the write key in the
//!   `Authorization` header. Deliberately performs **no** response
//!   verification — a log's key does not exist until its first write
//!   completes, so a verifying add client could never bootstrap a new log.
//! - [`AuditClient`]: the read surface. Fetches `/metadata` once, builds a
//!   [`LogVerifier`] and checks every STH signature before handing it to the
//!   caller.
//!
//! The verifier (and the public key DER behind it) is cached per client with
//! double-checked locking, so concurrent readers fetch the metadata once.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub use error::ClientError;
use tablelog_core::api::{
    AddChainResponse, AddObjectHashRequest, GetEntriesResponse, GetEntryAndProofResponse,
    GetProofByHashResponse, GetSthConsistencyResponse, GetSthResponse, MetadataResponse,
};
use tablelog_core::rfc6962::{DigitallySigned, SignedCertificateTimestamp};
use tablelog_core::verifier::LogVerifier;

/// An STH that passed signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSth {
    /// Number of leaves covered.
    pub tree_size: u64,
    /// Signing time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// The verified root hash.
    pub root_hash: [u8; 32],
    /// The raw TLS-encoded signature, for re-serving to others.
    pub signature: Vec<u8>,
}

/// Write capability: submit hashes, receive SCTs.
pub trait AddClient: Send + Sync {
    /// Submits an object hash with its extra data and returns the decoded
    /// SCT together with the raw response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, or an
    /// undecodable response.
    fn add_object_hash(
        &self,
        hash: [u8; 32],
        extra_data: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(SignedCertificateTimestamp, AddChainResponse), ClientError>>
           + Send;
}

/// Read capability: the audit surface with verified STHs.
pub trait AuditClient: Send + Sync {
    /// Fetches and verifies the tree head, optionally at a fixed size.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an invalid signature.
    fn get_sth(
        &self,
        tree_size: Option<u64>,
    ) -> impl std::future::Future<Output = Result<VerifiedSth, ClientError>> + Send;

    /// Fetches the consistency path between two sizes.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn get_sth_consistency(
        &self,
        first: u64,
        second: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Vec<u8>>, ClientError>> + Send;

    /// Fetches the inclusion proof for a leaf hash.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn get_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
    ) -> impl std::future::Future<Output = Result<GetProofByHashResponse, ClientError>> + Send;

    /// Fetches a page of entries; `start`/`end` inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn get_entries(
        &self,
        start: u64,
        end: u64,
    ) -> impl std::future::Future<Output = Result<GetEntriesResponse, ClientError>> + Send;

    /// Fetches one entry with its proof.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn get_entry_and_proof(
        &self,
        tree_size: u64,
        leaf_index: u64,
    ) -> impl std::future::Future<Output = Result<GetEntryAndProofResponse, ClientError>> + Send;
}

/// Client for a single log.
pub struct LogClient {
    /// Base URL of the log, e.g. `http://host/dataset/<table>`.
    url: String,
    /// Write key injected into `Authorization` on adds.
    add_api_key: String,
    http: reqwest::Client,
    /// Lazily fetched verifier; the mutex single-flights the metadata fetch.
    verifier: Mutex<Option<Arc<LogVerifier>>>,
}

impl LogClient {
    /// Creates a client for the log at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, add_api_key: impl Into<String>) -> Self {
        Self {
            url: into_trimmed(url),
            add_api_key: add_api_key.into(),
            http: reqwest::Client::new(),
            verifier: Mutex::new(None),
        }
    }

    /// The log's base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/ct/v1/{op}", self.url)
    }

    /// Fetches the log's public key DER from `/metadata`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-200 status.
    pub async fn fetch_public_key_der(&self) -> Result<Vec<u8>, ClientError> {
        let response: MetadataResponse = self.get_json(&self.endpoint("metadata"), &[]).await?;
        Ok(response.key)
    }

    /// Returns the cached verifier, fetching the log's key on first use.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unusable key.
    pub async fn verifier(&self) -> Result<Arc<LogVerifier>, ClientError> {
        if let Some(verifier) = self.verifier.lock().expect("verifier lock poisoned").clone() {
            return Ok(verifier);
        }

        let der = self.fetch_public_key_der().await?;
        let fresh = Arc::new(LogVerifier::from_public_key_der(&der)?);

        let mut slot = self.verifier.lock().expect("verifier lock poisoned");
        // Another task may have won the fetch; keep the first one.
        let winner = slot.get_or_insert_with(|| Arc::clone(&fresh));
        Ok(Arc::clone(winner))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        response.json().await.map_err(ClientError::Transport)
    }
}

fn into_trimmed(url: impl Into<String>) -> String {
    let mut url = url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

impl AddClient for LogClient {
    async fn add_object_hash(
        &self,
        hash: [u8; 32],
        extra_data: &serde_json::Value,
    ) -> Result<(SignedCertificateTimestamp, AddChainResponse), ClientError> {
        let request = AddObjectHashRequest {
            hash: hash.to_vec(),
            extra_data: extra_data.clone(),
        };
        let response = self
            .http
            .post(self.endpoint("add-objecthash"))
            .header("Authorization", &self.add_api_key)
            .json(&request)
            .send()
            .await
            .map_err(ClientError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body: AddChainResponse = response.json().await.map_err(ClientError::Transport)?;

        let log_id: [u8; 32] = body
            .id
            .as_slice()
            .try_into()
            .map_err(|_| ClientError::MalformedResponse("log ID is not 32 bytes"))?;
        let sct = SignedCertificateTimestamp {
            log_id,
            timestamp: body.timestamp,
            extensions: Vec::new(),
            signature: DigitallySigned::decode(&body.signature)
                .map_err(|_| ClientError::MalformedResponse("undecodable SCT signature"))?,
        };
        Ok((sct, body))
    }
}

impl AuditClient for LogClient {
    async fn get_sth(&self, tree_size: Option<u64>) -> Result<VerifiedSth, ClientError> {
        let mut query = Vec::new();
        if let Some(size) = tree_size {
            query.push(("tree_size", size.to_string()));
        }
        let body: GetSthResponse = self.get_json(&self.endpoint("get-sth"), &query).await?;

        let root_hash: [u8; 32] = body
            .sha256_root_hash
            .as_slice()
            .try_into()
            .map_err(|_| ClientError::MalformedResponse("root hash is not 32 bytes"))?;
        let signature = DigitallySigned::decode(&body.tree_head_signature)
            .map_err(|_| ClientError::MalformedResponse("undecodable STH signature"))?;

        let verifier = self.verifier().await?;
        verifier.verify_sth(body.tree_size, body.timestamp, &root_hash, &signature)?;

        Ok(VerifiedSth {
            tree_size: body.tree_size,
            timestamp: body.timestamp,
            root_hash,
            signature: body.tree_head_signature,
        })
    }

    async fn get_sth_consistency(
        &self,
        first: u64,
        second: u64,
    ) -> Result<Vec<Vec<u8>>, ClientError> {
        let body: GetSthConsistencyResponse = self
            .get_json(
                &self.endpoint("get-sth-consistency"),
                &[("first", first.to_string()), ("second", second.to_string())],
            )
            .await?;
        Ok(body.consistency)
    }

    async fn get_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
    ) -> Result<GetProofByHashResponse, ClientError> {
        self.get_json(
            &self.endpoint("get-proof-by-hash"),
            &[
                ("hash", BASE64.encode(leaf_hash)),
                ("tree_size", tree_size.to_string()),
            ],
        )
        .await
    }

    async fn get_entries(&self, start: u64, end: u64) -> Result<GetEntriesResponse, ClientError> {
        self.get_json(
            &self.endpoint("get-entries"),
            &[("start", start.to_string()), ("end", end.to_string())],
        )
        .await
    }

    async fn get_entry_and_proof(
        &self,
        tree_size: u64,
        leaf_index: u64,
    ) -> Result<GetEntryAndProofResponse, ClientError> {
        self.get_json(
            &self.endpoint("get-entry-and-proof"),
            &[
                ("tree_size", tree_size.to_string()),
                ("leaf_index", leaf_index.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let client = LogClient::new("http://log.example/dataset/tbl///", "k");
        assert_eq!(client.url(), "http://log.example/dataset/tbl");
        assert_eq!(
            client.endpoint("get-sth"),
            "http://log.example/dataset/tbl/ct/v1/get-sth"
        );
    }
}
