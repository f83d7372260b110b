//! Full-log audit: walk every entry, recompute the root, check the STH.
//!
//! The walk keeps one pending hash per set bit of the entry count — a
//! completed left subtree waiting for its right sibling — so memory stays
//! logarithmic in the log size. Each entry is additionally checked for
//! content: the leaf must be object-hash typed, and the object hash of its
//! extra data must equal the hash inside the leaf. A log cannot hide a
//! record behind a correct tree shape.

use anyhow::{bail, Context, Result};

use tablelog_client::{AuditClient, LogClient, VerifiedSth};
use tablelog_core::merkle::{self, RootAccumulator};
use tablelog_core::objecthash::object_hash;
use tablelog_core::rfc6962::{LeafPayload, MerkleTreeLeaf};

/// What one audit run established.
#[derive(Debug)]
pub struct AuditReport {
    /// The verified STH the walk was checked against.
    pub sth: VerifiedSth,
    /// Number of entries walked.
    pub entries: u64,
}

/// Page size for the entry walk; matches the server cap.
const PAGE: u64 = 100;

/// Walks `[0, sth.tree_size)` and verifies the recomputed root.
///
/// # Errors
///
/// Fails on transport errors, a mis-typed or lying entry, or a root
/// mismatch.
pub async fn audit_log(client: &LogClient) -> Result<AuditReport> {
    let sth = client
        .get_sth(None)
        .await
        .context("fetching signed tree head")?;

    let mut accumulator = RootAccumulator::new();
    let mut index: u64 = 0;

    while index < sth.tree_size {
        let last_wanted = (index + PAGE - 1).min(sth.tree_size - 1);
        let page = client
            .get_entries(index, last_wanted)
            .await
            .with_context(|| format!("fetching entries from {index}"))?;
        if page.entries.is_empty() {
            bail!("log returned no entries at index {index}");
        }

        for entry in &page.entries {
            if index >= sth.tree_size {
                break;
            }
            let leaf = MerkleTreeLeaf::decode(&entry.leaf_input)
                .with_context(|| format!("undecodable leaf at index {index}"))?;

            // Shape: the leaf hash feeds the root recomputation.
            accumulator.push(merkle::leaf_hash(&entry.leaf_input));

            // Content: the leaf must commit to exactly its extra data.
            match leaf.payload {
                LeafPayload::ObjectHash(committed) => {
                    let data: serde_json::Value = serde_json::from_slice(&entry.extra_data)
                        .with_context(|| format!("entry {index} extra data is not JSON"))?;
                    let recomputed =
                        object_hash(&data).with_context(|| format!("hashing entry {index}"))?;
                    if recomputed != committed {
                        bail!(
                            "entry {index} lies: leaf commits to {}, data hashes to {}",
                            hex::encode(committed),
                            hex::encode(recomputed)
                        );
                    }
                },
                LeafPayload::Cms(_) => {
                    bail!("entry {index} is not an object-hash entry");
                },
            }
            index += 1;
        }
    }

    let root = accumulator.root();
    if root != sth.root_hash {
        bail!(
            "root mismatch: STH says {}, entries fold to {}",
            hex::encode(sth.root_hash),
            hex::encode(root)
        );
    }

    Ok(AuditReport {
        entries: index,
        sth,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::*;
    use tablelog_client::AddClient;
    use tablelog_core::canonical::filter_and_hash;
    use tablelog_core::table_name::TableNameValidator;
    use tablelog_server::http::router;
    use tablelog_server::storage::SqliteStore;
    use tablelog_server::submission::ApiKeyValidator;
    use tablelog_server::AppState;

    const WRITE_KEY: &str = "secret";

    async fn start_server() -> String {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let state = AppState::new(
            "test-account",
            Arc::clone(&store) as Arc<dyn tablelog_server::storage::StorageWriter>,
            store as Arc<dyn tablelog_server::storage::VerifiableLog>,
            Arc::new(ApiKeyValidator::new(WRITE_KEY)),
            TableNameValidator::create_named("insecure-skip-validation", "").unwrap(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(n: u32) -> Value {
        json!({"n": n, "name": format!("row-{n}")})
    }

    #[tokio::test]
    async fn honest_log_passes_audit() {
        let base = start_server().await;
        let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

        for n in 0..7 {
            let data = record(n);
            let map = data.as_object().unwrap();
            let (canonical, hash) = filter_and_hash(map).unwrap();
            client
                .add_object_hash(hash, &Value::Object(canonical))
                .await
                .unwrap();
        }

        let report = audit_log(&client).await.unwrap();
        assert_eq!(report.entries, 7);
        assert_eq!(report.sth.tree_size, 7);
    }

    #[tokio::test]
    async fn lying_entry_fails_the_content_check() {
        let base = start_server().await;
        let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

        // The API-key validator takes the submitted hash on trust; a hash
        // that does not match its extra data is exactly what the auditor
        // exists to catch.
        client
            .add_object_hash([0xde; 32], &json!({"honest": false}))
            .await
            .unwrap();

        let err = audit_log(&client).await.unwrap_err();
        assert!(err.to_string().contains("lies"), "{err}");
    }

    #[tokio::test]
    async fn audit_walks_past_one_page() {
        let base = start_server().await;
        let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

        for n in 0..120 {
            let data = record(n);
            let map = data.as_object().unwrap();
            let (canonical, hash) = filter_and_hash(map).unwrap();
            client
                .add_object_hash(hash, &Value::Object(canonical))
                .await
                .unwrap();
        }

        let report = audit_log(&client).await.unwrap();
        assert_eq!(report.entries, 120);
    }
}
