//! JSON bodies for the REST surface.
//!
//! Field names follow the RFC 6962 JSON conventions (`sha256_root_hash`,
//! `leaf_input`, `audit_path`, ...) so standard CT tooling can read the
//! responses. Byte fields travel as standard base64.

use serde::{Deserialize, Serialize};

/// Serde adapter for base64-encoded byte fields.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialises bytes as standard base64.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    /// Deserialises standard base64 into bytes.
    ///
    /// # Errors
    ///
    /// Fails on invalid base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }

    /// Serde adapter for lists of base64-encoded byte strings.
    pub mod list {
        use super::{Engine, STANDARD};
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        /// Serialises each element as standard base64.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            items: &[Vec<u8>],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            items
                .iter()
                .map(|item| STANDARD.encode(item))
                .collect::<Vec<_>>()
                .serialize(serializer)
        }

        /// Deserialises a list of standard base64 strings.
        ///
        /// # Errors
        ///
        /// Fails on invalid base64 in any element.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec<u8>>, D::Error> {
            let strings = Vec::<String>::deserialize(deserializer)?;
            strings
                .into_iter()
                .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
                .collect()
        }
    }
}

/// Request body for `add-objecthash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddObjectHashRequest {
    /// The 32-byte object hash of the canonicalised record.
    #[serde(with = "b64")]
    pub hash: Vec<u8>,

    /// The canonicalised record itself, stored as the leaf's extra data.
    #[serde(default)]
    pub extra_data: serde_json::Value,
}

/// Response for `add-objecthash` and `get-objecthash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddChainResponse {
    /// SCT version; always 0 (v1).
    pub sct_version: u8,

    /// The issuing log's ID.
    #[serde(with = "b64")]
    pub id: Vec<u8>,

    /// SCT timestamp in milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// CT extensions; empty.
    pub extensions: String,

    /// TLS-encoded `DigitallySigned`.
    #[serde(with = "b64")]
    pub signature: Vec<u8>,
}

/// Response for `get-sth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSthResponse {
    /// Number of leaves covered by this head.
    pub tree_size: u64,

    /// Signing time in milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// The tree head.
    #[serde(with = "b64")]
    pub sha256_root_hash: Vec<u8>,

    /// TLS-encoded `DigitallySigned` over the STH signature input.
    #[serde(with = "b64")]
    pub tree_head_signature: Vec<u8>,
}

/// Response for `get-sth-consistency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSthConsistencyResponse {
    /// Consistency path between the two requested sizes.
    #[serde(with = "b64::list")]
    pub consistency: Vec<Vec<u8>>,
}

/// Response for `get-proof-by-hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetProofByHashResponse {
    /// Index of the proven leaf.
    pub leaf_index: u64,

    /// Audit path from the leaf to the root.
    #[serde(with = "b64::list")]
    pub audit_path: Vec<Vec<u8>>,
}

/// One entry in a `get-entries` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafEntry {
    /// TLS-encoded `MerkleTreeLeaf`.
    #[serde(with = "b64")]
    pub leaf_input: Vec<u8>,

    /// JSON-encoded canonical record (empty for CMS leaves).
    #[serde(with = "b64")]
    pub extra_data: Vec<u8>,
}

/// Response for `get-entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEntriesResponse {
    /// The requested entries, capped by the server.
    pub entries: Vec<LeafEntry>,
}

/// Response for `get-entry-and-proof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEntryAndProofResponse {
    /// TLS-encoded `MerkleTreeLeaf`.
    #[serde(with = "b64")]
    pub leaf_input: Vec<u8>,

    /// JSON-encoded canonical record.
    #[serde(with = "b64")]
    pub extra_data: Vec<u8>,

    /// Audit path for the entry at the requested size.
    #[serde(with = "b64::list")]
    pub audit_path: Vec<Vec<u8>>,
}

/// Response for `/metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataResponse {
    /// SPKI DER public key of the log.
    #[serde(with = "b64")]
    pub key: Vec<u8>,
}
