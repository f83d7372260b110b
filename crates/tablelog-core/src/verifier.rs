//! Client-side verification of log signatures.
//!
//! A [`LogVerifier`] is built from the SPKI DER public key served by a log's
//! `/metadata` endpoint. It checks STH and SCT signatures by reconstructing
//! the RFC 6962 signature inputs and verifying the embedded ASN.1 DER ECDSA
//! signature.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::rfc6962::{
    sct_signature_input, sth_signature_input, DigitallySigned, MerkleTreeLeaf,
    SignedCertificateTimestamp, LOG_ID_SIZE,
};

/// Errors raised while verifying log signatures.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The public key DER could not be parsed.
    #[error("invalid log public key")]
    InvalidPublicKey,

    /// The SCT names a different log than the verifier's key.
    #[error("SCT log ID does not match the log's key")]
    LogIdMismatch,

    /// The signature bytes are not valid ASN.1 DER ECDSA.
    #[error("malformed signature")]
    MalformedSignature,

    /// The signature does not verify over the reconstructed input.
    #[error("signature verification failed")]
    BadSignature,

    /// The structure to verify could not be serialised.
    #[error("could not serialise signature input")]
    Encoding(#[from] crate::tls::TlsError),
}

/// Verifies signatures issued by a single log.
#[derive(Debug, Clone)]
pub struct LogVerifier {
    key: VerifyingKey,
    log_id: [u8; LOG_ID_SIZE],
}

impl LogVerifier {
    /// Builds a verifier from SPKI DER public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidPublicKey`] if the DER does not parse as
    /// a P-256 public key.
    pub fn from_public_key_der(der: &[u8]) -> Result<Self, VerifyError> {
        let key =
            VerifyingKey::from_public_key_der(der).map_err(|_| VerifyError::InvalidPublicKey)?;
        Ok(Self {
            key,
            log_id: Sha256::digest(der).into(),
        })
    }

    /// The log ID derived from the public key.
    #[must_use]
    pub const fn log_id(&self) -> [u8; LOG_ID_SIZE] {
        self.log_id
    }

    /// Verifies a `DigitallySigned` over an already-serialised input.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is malformed or does not verify.
    pub fn verify_signature(
        &self,
        input: &[u8],
        signed: &DigitallySigned,
    ) -> Result<(), VerifyError> {
        let signature =
            Signature::from_der(&signed.signature).map_err(|_| VerifyError::MalformedSignature)?;
        self.key
            .verify(input, &signature)
            .map_err(|_| VerifyError::BadSignature)
    }

    /// Verifies an SCT against the leaf it promises to include.
    ///
    /// The leaf's timestamp is ignored in favour of the SCT's, which is what
    /// the log signed at issuance.
    ///
    /// # Errors
    ///
    /// Returns an error on log ID mismatch or signature failure.
    pub fn verify_sct(
        &self,
        sct: &SignedCertificateTimestamp,
        leaf: &MerkleTreeLeaf,
    ) -> Result<(), VerifyError> {
        if sct.log_id != self.log_id {
            return Err(VerifyError::LogIdMismatch);
        }
        let input = sct_signature_input(sct.timestamp, leaf)?;
        self.verify_signature(&input, &sct.signature)
    }

    /// Verifies a signed tree head.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature does not cover the given size,
    /// timestamp and root hash.
    pub fn verify_sth(
        &self,
        tree_size: u64,
        timestamp: u64,
        root_hash: &[u8; 32],
        signature: &DigitallySigned,
    ) -> Result<(), VerifyError> {
        let input = sth_signature_input(timestamp, tree_size, root_hash);
        self.verify_signature(&input, signature)
    }
}
