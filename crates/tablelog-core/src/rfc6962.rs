//! RFC 6962 structures, generalised for object-hash leaves.
//!
//! The log commits to table rows rather than X.509 certificates, so the
//! `MerkleTreeLeaf` carries one of two non-standard entry types from the
//! experimental range:
//!
//! - [`EntryType::ObjectHash`] (`0x8000`): the 32-byte object hash of a
//!   canonicalised record, encoded as a fixed array
//! - [`EntryType::Cms`] (`0x8001`): an opaque signed envelope, encoded with a
//!   24-bit length prefix
//!
//! Everything else — leaf framing, `DigitallySigned`, the SCT structure, and
//! the SCT/STH signature inputs — follows RFC 6962 §3.2/§3.4/§3.5 byte for
//! byte.

use sha2::{Digest, Sha256};

use crate::tls::{Reader, TlsError, Writer};

/// Protocol version. Only v1 exists.
pub const V1: u8 = 0;

/// `MerkleLeafType.timestamped_entry`.
pub const TIMESTAMPED_ENTRY: u8 = 0;

/// `SignatureType.certificate_timestamp` — SCT signature input.
const SIGNATURE_TYPE_CERTIFICATE_TIMESTAMP: u8 = 0;

/// `SignatureType.tree_hash` — STH signature input.
const SIGNATURE_TYPE_TREE_HASH: u8 = 1;

/// Size of a log ID (SHA-256 of the log's SPKI DER).
pub const LOG_ID_SIZE: usize = 32;

/// The entry type of a timestamped entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum EntryType {
    /// A 32-byte object hash over a canonicalised record.
    ObjectHash = 0x8000,
    /// An opaque signed envelope accepted by a trusted-signer validator.
    Cms = 0x8001,
}

impl EntryType {
    fn from_wire(value: u16) -> Result<Self, TlsError> {
        match value {
            0x8000 => Ok(Self::ObjectHash),
            0x8001 => Ok(Self::Cms),
            other => Err(TlsError::InvalidValue {
                field: "entry_type",
                value: u64::from(other),
            }),
        }
    }
}

/// The payload of a timestamped entry, discriminated by [`EntryType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafPayload {
    /// Fixed 32-byte object hash.
    ObjectHash([u8; 32]),
    /// Length-prefixed opaque envelope.
    Cms(Vec<u8>),
}

impl LeafPayload {
    /// The entry type this payload encodes as.
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        match self {
            Self::ObjectHash(_) => EntryType::ObjectHash,
            Self::Cms(_) => EntryType::Cms,
        }
    }

    fn encode_into(&self, w: &mut Writer) -> Result<(), TlsError> {
        match self {
            Self::ObjectHash(hash) => {
                w.put_fixed(hash);
                Ok(())
            },
            Self::Cms(body) => w.put_opaque24(body),
        }
    }

    fn decode_from(entry_type: EntryType, r: &mut Reader<'_>) -> Result<Self, TlsError> {
        match entry_type {
            EntryType::ObjectHash => Ok(Self::ObjectHash(r.read_fixed::<32>()?)),
            EntryType::Cms => Ok(Self::Cms(r.read_opaque24()?)),
        }
    }
}

/// An RFC 6962 `MerkleTreeLeaf` (v1, `timestamped_entry`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTreeLeaf {
    /// Milliseconds since the Unix epoch; assigned by the log at append time.
    pub timestamp: u64,
    /// The committed payload.
    pub payload: LeafPayload,
    /// CT extensions. Always empty today; kept on the wire for conformance.
    pub extensions: Vec<u8>,
}

impl MerkleTreeLeaf {
    /// Builds an object-hash leaf.
    #[must_use]
    pub const fn object_hash(hash: [u8; 32], timestamp: u64) -> Self {
        Self {
            timestamp,
            payload: LeafPayload::ObjectHash(hash),
            extensions: Vec::new(),
        }
    }

    /// Builds a CMS leaf over an opaque signed envelope.
    #[must_use]
    pub const fn cms(body: Vec<u8>, timestamp: u64) -> Self {
        Self {
            timestamp,
            payload: LeafPayload::Cms(body),
            extensions: Vec::new(),
        }
    }

    /// The leaf's entry type.
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        self.payload.entry_type()
    }

    /// TLS-encodes the leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable-length field exceeds its bound.
    pub fn encode(&self) -> Result<Vec<u8>, TlsError> {
        let mut w = Writer::new();
        w.put_u8(V1);
        w.put_u8(TIMESTAMPED_ENTRY);
        w.put_u64(self.timestamp);
        w.put_u16(self.entry_type() as u16);
        self.payload.encode_into(&mut w)?;
        w.put_opaque16(&self.extensions)?;
        Ok(w.into_bytes())
    }

    /// Decodes a TLS-encoded leaf, consuming the entire input.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation, trailing bytes, or an unknown version,
    /// leaf type or entry type.
    pub fn decode(bytes: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(bytes);
        let version = r.read_u8()?;
        if version != V1 {
            return Err(TlsError::InvalidValue {
                field: "version",
                value: u64::from(version),
            });
        }
        let leaf_type = r.read_u8()?;
        if leaf_type != TIMESTAMPED_ENTRY {
            return Err(TlsError::InvalidValue {
                field: "leaf_type",
                value: u64::from(leaf_type),
            });
        }
        let timestamp = r.read_u64()?;
        let entry_type = EntryType::from_wire(r.read_u16()?)?;
        let payload = LeafPayload::decode_from(entry_type, &mut r)?;
        let extensions = r.read_opaque16()?;
        r.expect_done()?;
        Ok(Self {
            timestamp,
            payload,
            extensions,
        })
    }

    /// RFC 6962 leaf hash: `SHA256(0x00 || encoded leaf)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the leaf cannot be encoded.
    pub fn leaf_hash(&self) -> Result<[u8; 32], TlsError> {
        let encoded = self.encode()?;
        let mut h = Sha256::new();
        h.update([crate::merkle::LEAF_PREFIX]);
        h.update(&encoded);
        Ok(h.finalize().into())
    }
}

/// `HashAlgorithm.sha256`.
pub const HASH_ALGORITHM_SHA256: u8 = 4;

/// `SignatureAlgorithm.ecdsa`.
pub const SIGNATURE_ALGORITHM_ECDSA: u8 = 3;

/// A TLS `DigitallySigned`: algorithm pair plus an opaque signature.
///
/// The log always signs SHA-256/ECDSA; decoding rejects anything else so a
/// mis-signed structure fails before signature verification is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    /// ASN.1 DER ECDSA signature bytes.
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    /// TLS-encodes the structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature exceeds the 16-bit length bound.
    pub fn encode(&self) -> Result<Vec<u8>, TlsError> {
        let mut w = Writer::new();
        w.put_u8(HASH_ALGORITHM_SHA256);
        w.put_u8(SIGNATURE_ALGORITHM_ECDSA);
        w.put_opaque16(&self.signature)?;
        Ok(w.into_bytes())
    }

    /// Decodes the structure, consuming the entire input.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation, trailing bytes or an algorithm pair
    /// other than SHA-256/ECDSA.
    pub fn decode(bytes: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(bytes);
        let ds = Self::decode_from(&mut r)?;
        r.expect_done()?;
        Ok(ds)
    }

    fn decode_from(r: &mut Reader<'_>) -> Result<Self, TlsError> {
        let hash_alg = r.read_u8()?;
        if hash_alg != HASH_ALGORITHM_SHA256 {
            return Err(TlsError::InvalidValue {
                field: "hash_algorithm",
                value: u64::from(hash_alg),
            });
        }
        let sig_alg = r.read_u8()?;
        if sig_alg != SIGNATURE_ALGORITHM_ECDSA {
            return Err(TlsError::InvalidValue {
                field: "signature_algorithm",
                value: u64::from(sig_alg),
            });
        }
        let signature = r.read_opaque16()?;
        Ok(Self { signature })
    }
}

/// A v1 Signed Certificate Timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificateTimestamp {
    /// SHA-256 of the issuing log's SPKI DER.
    pub log_id: [u8; LOG_ID_SIZE],
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// CT extensions; empty.
    pub extensions: Vec<u8>,
    /// Signature over the SCT signature input.
    pub signature: DigitallySigned,
}

impl SignedCertificateTimestamp {
    /// TLS-encodes the SCT.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable-length field exceeds its bound.
    pub fn encode(&self) -> Result<Vec<u8>, TlsError> {
        let mut w = Writer::new();
        w.put_u8(V1);
        w.put_fixed(&self.log_id);
        w.put_u64(self.timestamp);
        w.put_opaque16(&self.extensions)?;
        w.put_fixed(&self.signature.encode()?);
        Ok(w.into_bytes())
    }

    /// Decodes a TLS-encoded SCT, consuming the entire input.
    ///
    /// # Errors
    ///
    /// Returns an error on truncation, trailing bytes or an unknown version.
    pub fn decode(bytes: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(bytes);
        let version = r.read_u8()?;
        if version != V1 {
            return Err(TlsError::InvalidValue {
                field: "sct_version",
                value: u64::from(version),
            });
        }
        let log_id = r.read_fixed::<LOG_ID_SIZE>()?;
        let timestamp = r.read_u64()?;
        let extensions = r.read_opaque16()?;
        let signature = DigitallySigned::decode_from(&mut r)?;
        r.expect_done()?;
        Ok(Self {
            log_id,
            timestamp,
            extensions,
            signature,
        })
    }
}

/// Serialises the SCT signature input (RFC 6962 §3.2) for a leaf.
///
/// The timestamp signed is the SCT's, which the log sets equal to the leaf's
/// at issuance.
///
/// # Errors
///
/// Returns an error if a variable-length field exceeds its bound.
pub fn sct_signature_input(timestamp: u64, leaf: &MerkleTreeLeaf) -> Result<Vec<u8>, TlsError> {
    let mut w = Writer::new();
    w.put_u8(V1);
    w.put_u8(SIGNATURE_TYPE_CERTIFICATE_TIMESTAMP);
    w.put_u64(timestamp);
    w.put_u16(leaf.entry_type() as u16);
    leaf.payload.encode_into(&mut w)?;
    w.put_opaque16(&leaf.extensions)?;
    Ok(w.into_bytes())
}

/// Serialises the STH signature input (RFC 6962 §3.5).
#[must_use]
pub fn sth_signature_input(timestamp: u64, tree_size: u64, root_hash: &[u8; 32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.put_u8(V1);
    w.put_u8(SIGNATURE_TYPE_TREE_HASH);
    w.put_u64(timestamp);
    w.put_u64(tree_size);
    w.put_fixed(root_hash);
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_hash_leaf_round_trips() {
        let leaf = MerkleTreeLeaf::object_hash([0x41; 32], 1_234_567_890_123);
        let encoded = leaf.encode().unwrap();
        let decoded = MerkleTreeLeaf::decode(&encoded).unwrap();
        assert_eq!(leaf, decoded);
    }

    #[test]
    fn cms_leaf_round_trips() {
        let leaf = MerkleTreeLeaf::cms(b"signed envelope bytes".to_vec(), 42);
        let decoded = MerkleTreeLeaf::decode(&leaf.encode().unwrap()).unwrap();
        assert_eq!(leaf, decoded);
        assert_eq!(decoded.entry_type(), EntryType::Cms);
    }

    #[test]
    fn leaf_encoding_layout() {
        let leaf = MerkleTreeLeaf::object_hash([0xaa; 32], 0x0102_0304_0506_0708);
        let encoded = leaf.encode().unwrap();
        // version(1) + leaf_type(1) + timestamp(8) + entry_type(2) + hash(32)
        // + extensions len(2)
        assert_eq!(encoded.len(), 46);
        assert_eq!(encoded[0], V1);
        assert_eq!(encoded[1], TIMESTAMPED_ENTRY);
        assert_eq!(&encoded[2..10], &0x0102_0304_0506_0708u64.to_be_bytes());
        assert_eq!(&encoded[10..12], &0x8000u16.to_be_bytes());
        assert_eq!(&encoded[12..44], &[0xaa; 32]);
        assert_eq!(&encoded[44..46], &[0, 0]);
    }

    #[test]
    fn digitally_signed_round_trips() {
        let ds = DigitallySigned {
            signature: vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01],
        };
        assert_eq!(ds, DigitallySigned::decode(&ds.encode().unwrap()).unwrap());
    }

    #[test]
    fn digitally_signed_rejects_foreign_algorithms() {
        // hash=sha512(6), sig=ecdsa(3)
        let bytes = [6u8, 3, 0, 0];
        assert!(matches!(
            DigitallySigned::decode(&bytes),
            Err(TlsError::InvalidValue {
                field: "hash_algorithm",
                ..
            })
        ));
    }

    #[test]
    fn sct_round_trips() {
        let sct = SignedCertificateTimestamp {
            log_id: [7; 32],
            timestamp: 99,
            extensions: Vec::new(),
            signature: DigitallySigned {
                signature: vec![1, 2, 3],
            },
        };
        assert_eq!(
            sct,
            SignedCertificateTimestamp::decode(&sct.encode().unwrap()).unwrap()
        );
    }

    #[test]
    fn sct_decode_rejects_trailing_bytes() {
        let sct = SignedCertificateTimestamp {
            log_id: [7; 32],
            timestamp: 99,
            extensions: Vec::new(),
            signature: DigitallySigned {
                signature: vec![1, 2, 3],
            },
        };
        let mut bytes = sct.encode().unwrap();
        bytes.push(0);
        assert!(matches!(
            SignedCertificateTimestamp::decode(&bytes),
            Err(TlsError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn sth_signature_input_layout() {
        let input = sth_signature_input(0x10, 0x20, &[0xcc; 32]);
        assert_eq!(input.len(), 1 + 1 + 8 + 8 + 32);
        assert_eq!(input[0], V1);
        assert_eq!(input[1], SIGNATURE_TYPE_TREE_HASH);
        assert_eq!(&input[2..10], &0x10u64.to_be_bytes());
        assert_eq!(&input[10..18], &0x20u64.to_be_bytes());
    }

    #[test]
    fn sct_signature_input_binds_entry() {
        let leaf_a = MerkleTreeLeaf::object_hash([1; 32], 5);
        let leaf_b = MerkleTreeLeaf::object_hash([2; 32], 5);
        assert_ne!(
            sct_signature_input(5, &leaf_a).unwrap(),
            sct_signature_input(5, &leaf_b).unwrap()
        );
    }
}
