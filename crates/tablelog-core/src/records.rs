//! Stored protobuf records.
//!
//! The server persists three record kinds in its keyed sidecar storage, all
//! encoded as protobuf so previously written values remain readable as fields
//! are added:
//!
//! - [`AddResponse`] under `"sct" || object_hash` — the issued promise
//! - [`SignedTreeHead`] under `"sth" || big_endian(tree_size)` — the frozen
//!   head at each observed size
//! - [`LogMetadata`] under the log key in the metadata namespace — the
//!   private signing key

use prost::Message;

/// A persisted SCT: the signature and the timestamp it covers.
///
/// Re-submissions of the same object hash are answered from this record so
/// the response bytes stay stable.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct AddResponse {
    /// TLS-encoded `DigitallySigned` over the SCT signature input.
    #[prost(bytes = "vec", tag = "1")]
    pub signature: Vec<u8>,

    /// Milliseconds since the Unix epoch; also the leaf timestamp.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// A persisted signed tree head, frozen per tree size.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct SignedTreeHead {
    /// Number of leaves covered by the head.
    #[prost(uint64, tag = "1")]
    pub tree_size: u64,

    /// Milliseconds since the Unix epoch at signing time.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,

    /// RFC 6962 tree head over the leaf sequence.
    #[prost(bytes = "vec", tag = "3")]
    pub sha256_root_hash: Vec<u8>,

    /// TLS-encoded `DigitallySigned` over the STH signature input.
    #[prost(bytes = "vec", tag = "4")]
    pub tree_head_signature: Vec<u8>,
}

/// Per-log metadata: today just the signing key.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct LogMetadata {
    /// SEC1 DER private key.
    #[prost(bytes = "vec", tag = "1")]
    pub private_key_der: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use prost::Message;

    use super::*;

    #[test]
    fn add_response_round_trips() {
        let record = AddResponse {
            signature: vec![4, 3, 0, 2, 0xab, 0xcd],
            timestamp: 1_700_000_000_123,
        };
        let bytes = record.encode_to_vec();
        assert_eq!(AddResponse::decode(bytes.as_slice()).unwrap(), record);
    }

    #[test]
    fn signed_tree_head_round_trips() {
        let record = SignedTreeHead {
            tree_size: 42,
            timestamp: 1_700_000_000_456,
            sha256_root_hash: vec![7; 32],
            tree_head_signature: vec![1, 2, 3],
        };
        let bytes = record.encode_to_vec();
        assert_eq!(SignedTreeHead::decode(bytes.as_slice()).unwrap(), record);
    }

    #[test]
    fn decoding_tolerates_unknown_fields() {
        // A future writer may append fields; old readers must not break.
        let mut bytes = LogMetadata {
            private_key_der: vec![0x30, 0x01, 0x00],
        }
        .encode_to_vec();
        // Unknown field 15, varint 1.
        bytes.extend_from_slice(&[0x78, 0x01]);
        let decoded = LogMetadata::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.private_key_der, vec![0x30, 0x01, 0x00]);
    }
}
