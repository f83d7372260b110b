//! P-256 log signing keys.
//!
//! Every log signs with its own ECDSA P-256 key, generated lazily on the
//! log's first write and never rotated. The private key persists as SEC1 DER;
//! the public key travels as SPKI DER; the log ID is the SHA-256 of the
//! public DER, binding every SCT and STH to the producing log.
//!
//! Errors deliberately carry no detail from the underlying crypto library:
//! the caller maps them straight to an opaque internal failure.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use p256::SecretKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::rfc6962::{DigitallySigned, LOG_ID_SIZE};

/// An opaque signing-key failure.
///
/// Key material and library diagnostics never appear in the message.
#[derive(Debug, Error)]
#[error("signing key operation failed")]
pub struct CryptoError;

/// A log's ECDSA P-256 signing key with its derived public identity.
#[derive(Clone)]
pub struct LogSigningKey {
    secret: SecretKey,
    public_der: Vec<u8>,
    log_id: [u8; LOG_ID_SIZE],
}

impl std::fmt::Debug for LogSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never render key material.
        f.debug_struct("LogSigningKey")
            .field("log_id", &hex_prefix(&self.log_id))
            .finish_non_exhaustive()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

impl LogSigningKey {
    /// Generates a fresh P-256 key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be serialised.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Parses a persisted SEC1 DER private key.
    ///
    /// # Errors
    ///
    /// Returns an opaque error on any parse failure.
    pub fn from_sec1_der(der: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_sec1_der(der).map_err(|_| CryptoError)?;
        Self::from_secret(secret)
    }

    fn from_secret(secret: SecretKey) -> Result<Self, CryptoError> {
        let public_der = secret
            .public_key()
            .to_public_key_der()
            .map_err(|_| CryptoError)?
            .into_vec();
        let log_id = Sha256::digest(&public_der).into();
        Ok(Self {
            secret,
            public_der,
            log_id,
        })
    }

    /// Serialises the private key as SEC1 DER for persistence.
    ///
    /// # Errors
    ///
    /// Returns an opaque error on serialisation failure.
    pub fn to_sec1_der(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(self.secret.to_sec1_der().map_err(|_| CryptoError)?.to_vec())
    }

    /// The SPKI DER encoding of the public key, as served by `/metadata`.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// `SHA256(public_key_der)`.
    #[must_use]
    pub const fn log_id(&self) -> [u8; LOG_ID_SIZE] {
        self.log_id
    }

    /// Signs a serialised signature input, producing a TLS `DigitallySigned`
    /// carrying an ASN.1 DER ECDSA signature.
    #[must_use]
    pub fn sign(&self, input: &[u8]) -> DigitallySigned {
        let key = SigningKey::from(self.secret.clone());
        let signature: Signature = key.sign(input);
        DigitallySigned {
            signature: signature.to_der().as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::LogVerifier;

    #[test]
    fn generated_key_round_trips_through_der() {
        let key = LogSigningKey::generate().unwrap();
        let der = key.to_sec1_der().unwrap();
        let restored = LogSigningKey::from_sec1_der(&der).unwrap();

        assert_eq!(key.public_key_der(), restored.public_key_der());
        assert_eq!(key.log_id(), restored.log_id());
    }

    #[test]
    fn log_id_is_sha256_of_public_der() {
        let key = LogSigningKey::generate().unwrap();
        let expected: [u8; 32] = Sha256::digest(key.public_key_der()).into();
        assert_eq!(key.log_id(), expected);
    }

    #[test]
    fn signatures_verify_against_the_public_key() {
        let key = LogSigningKey::generate().unwrap();
        let verifier = LogVerifier::from_public_key_der(key.public_key_der()).unwrap();

        let ds = key.sign(b"signature input");
        verifier.verify_signature(b"signature input", &ds).unwrap();
        assert!(verifier.verify_signature(b"different input", &ds).is_err());
    }

    #[test]
    fn malformed_der_is_rejected_opaquely() {
        let err = LogSigningKey::from_sec1_der(&[0u8; 16]).unwrap_err();
        assert_eq!(err.to_string(), "signing key operation failed");
    }

    #[test]
    fn debug_output_does_not_leak_key_material() {
        let key = LogSigningKey::generate().unwrap();
        let rendered = format!("{key:?}");
        let der = key.to_sec1_der().unwrap();
        assert!(!rendered.contains(&hex::encode(der)));
    }
}
