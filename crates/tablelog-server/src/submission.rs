//! Pluggable submission validation for `add-objecthash`.
//!
//! A [`SubmissionValidator`] authenticates a write request and constructs the
//! leaf that will enter the tree, returning:
//!
//! - the **dup key**: the byte string the SCT index deduplicates on
//! - the **leaf**: a `MerkleTreeLeaf` whose timestamp the server fills in at
//!   append time
//! - the **extra data** stored alongside the leaf for auditors
//!
//! Two implementations exist. [`ApiKeyValidator`] trusts any caller holding
//! the configured write key and accepts the object hash as claimed — an
//! authorization decision only. [`TrustedSignerValidator`] accepts unsolicited
//! submissions signed by a pinned set of trusted signers, checking a detached
//! P-256 signature, the signer's validity window and a caller-supplied
//! payload check before admitting the envelope as a CMS-typed leaf.

use std::sync::Arc;

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::ServerError;
use crate::identity::LogRef;
use tablelog_core::api::AddObjectHashRequest;
use tablelog_core::objecthash::HASH_SIZE;
use tablelog_core::rfc6962::MerkleTreeLeaf;

/// A validated submission, ready to append.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Deduplication key for the SCT index.
    pub dup_key: Vec<u8>,
    /// The leaf to append; timestamp still zero.
    pub leaf: MerkleTreeLeaf,
    /// Extra data stored with the leaf; empty when there is none.
    pub extra_data: Vec<u8>,
}

/// Validates a write request and constructs its leaf.
pub trait SubmissionValidator: Send + Sync {
    /// Authenticates the request and produces the submission.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` when authentication or payload validation fails,
    /// `InvalidRequest` when the body cannot be decoded.
    fn validate(
        &self,
        log: &LogRef,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<Submission, ServerError>;
}

/// Accepts any JSON submission whose `Authorization` header carries the
/// configured write key. Does not check that the claimed hash matches the
/// extra data — that is the submitter's job, and auditors will catch lies.
pub struct ApiKeyValidator {
    key: String,
}

impl ApiKeyValidator {
    /// Creates a validator for the given write key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl SubmissionValidator for ApiKeyValidator {
    fn validate(
        &self,
        _log: &LogRef,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<Submission, ServerError> {
        if authorization != Some(self.key.as_str()) {
            return Err(ServerError::NotAuthorized);
        }

        let request: AddObjectHashRequest =
            serde_json::from_slice(body).map_err(|_| ServerError::InvalidRequest)?;
        let hash: [u8; HASH_SIZE] = request
            .hash
            .as_slice()
            .try_into()
            .map_err(|_| ServerError::InvalidRequest)?;
        let extra_data =
            serde_json::to_vec(&request.extra_data).map_err(|_| ServerError::InvalidRequest)?;

        Ok(Submission {
            dup_key: hash.to_vec(),
            leaf: MerkleTreeLeaf::object_hash(hash, 0),
            extra_data,
        })
    }
}

/// One pinned trusted signer.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustedSigner {
    /// Subject name the payload check can match against.
    pub common_name: String,
    /// Validity window start, milliseconds since the Unix epoch.
    pub not_before: u64,
    /// Validity window end, milliseconds since the Unix epoch.
    pub not_after: u64,
    /// SPKI DER public key, base64 in the bundle file.
    #[serde(with = "tablelog_core::api::b64")]
    pub public_key_der: Vec<u8>,
}

/// A check run against the verified payload, typically matching payload
/// fields (jurisdiction, timestamp) against the signer's identity and
/// validity window.
pub type PayloadCheck = Arc<dyn Fn(&TrustedSigner, &[u8]) -> Result<(), String> + Send + Sync>;

/// The signed envelope a trusted-signer submission carries.
#[derive(Debug, Deserialize)]
struct SignedEnvelope {
    /// The payload bytes, base64.
    #[serde(with = "tablelog_core::api::b64")]
    payload: Vec<u8>,
    /// Common name of the claimed signer.
    signer: String,
    /// Detached ASN.1 DER ECDSA P-256 signature over the payload, base64.
    #[serde(with = "tablelog_core::api::b64")]
    signature: Vec<u8>,
}

/// Accepts submissions signed by one of a pinned set of signers.
pub struct TrustedSignerValidator {
    signers: Vec<TrustedSigner>,
    payload_check: PayloadCheck,
}

impl TrustedSignerValidator {
    /// Creates a validator from a signer bundle.
    #[must_use]
    pub fn new(signers: Vec<TrustedSigner>, payload_check: PayloadCheck) -> Self {
        Self {
            signers,
            payload_check,
        }
    }

    /// Parses a JSON signer bundle (a list of [`TrustedSigner`] entries).
    ///
    /// # Errors
    ///
    /// Returns the JSON error for a malformed bundle.
    pub fn from_bundle_json(
        bundle: &str,
        payload_check: PayloadCheck,
    ) -> Result<Self, serde_json::Error> {
        let signers: Vec<TrustedSigner> = serde_json::from_str(bundle)?;
        Ok(Self::new(signers, payload_check))
    }
}

impl SubmissionValidator for TrustedSignerValidator {
    fn validate(
        &self,
        _log: &LogRef,
        _authorization: Option<&str>,
        body: &[u8],
    ) -> Result<Submission, ServerError> {
        let envelope: SignedEnvelope =
            serde_json::from_slice(body).map_err(|_| ServerError::InvalidRequest)?;

        // Exactly one pinned signer may match the claimed name.
        let mut matches = self
            .signers
            .iter()
            .filter(|s| s.common_name == envelope.signer);
        let signer = matches.next().ok_or(ServerError::NotAuthorized)?;
        if matches.next().is_some() {
            return Err(ServerError::NotAuthorized);
        }

        let key = VerifyingKey::from_public_key_der(&signer.public_key_der)
            .map_err(|_| ServerError::Internal)?;
        let signature =
            Signature::from_der(&envelope.signature).map_err(|_| ServerError::NotAuthorized)?;
        key.verify(&envelope.payload, &signature)
            .map_err(|_| ServerError::NotAuthorized)?;

        (self.payload_check)(signer, &envelope.payload).map_err(|reason| {
            tracing::debug!(signer = %signer.common_name, %reason, "payload check failed");
            ServerError::NotAuthorized
        })?;

        // The whole envelope is the leaf; duplicates key on its digest.
        let dup_key: [u8; 32] = Sha256::digest(body).into();
        Ok(Submission {
            dup_key: dup_key.to_vec(),
            leaf: MerkleTreeLeaf::cms(body.to_vec(), 0),
            extra_data: Vec::new(),
        })
    }
}

/// A payload check matching the original deployment's conventions: the
/// payload is JSON whose `jurisdiction` equals the signer's common name and
/// whose `timestamp` (milliseconds) falls inside the signer's validity
/// window.
#[must_use]
pub fn jurisdiction_payload_check() -> PayloadCheck {
    Arc::new(|signer, payload| {
        #[derive(Deserialize)]
        struct Claims {
            jurisdiction: String,
            timestamp: u64,
        }
        let claims: Claims =
            serde_json::from_slice(payload).map_err(|e| format!("payload not JSON: {e}"))?;
        if claims.jurisdiction != signer.common_name {
            return Err("jurisdiction does not match signer".into());
        }
        if claims.timestamp < signer.not_before || claims.timestamp > signer.not_after {
            return Err("timestamp outside signer validity".into());
        }
        Ok(())
    })
}
