//! Client tests against a live server.

use std::sync::Arc;

use serde_json::json;

use tablelog_client::{AddClient, AuditClient, ClientError, LogClient};
use tablelog_core::merkle;
use tablelog_core::rfc6962::MerkleTreeLeaf;
use tablelog_server::http::router;
use tablelog_server::storage::SqliteStore;
use tablelog_server::submission::ApiKeyValidator;
use tablelog_core::table_name::TableNameValidator;
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

#[tokio::test]
async fn add_then_audit_round_trip() {
    let base = start_server().await;
    let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

    let (sct, response) = client
        .add_object_hash([0x11; 32], &json!({"row": 1}))
        .await
        .unwrap();
    assert_eq!(u64::from(response.sct_version), 0);

    // The SCT verifies against the log's published key.
    let verifier = client.verifier().await.unwrap();
    let leaf = MerkleTreeLeaf::object_hash([0x11; 32], sct.timestamp);
    verifier.verify_sct(&sct, &leaf).unwrap();

    // The verified STH covers the entry, provably.
    let sth = client.get_sth(None).await.unwrap();
    assert_eq!(sth.tree_size, 1);

    let leaf_hash = leaf.leaf_hash().unwrap();
    let proof = client.get_proof_by_hash(&leaf_hash, 1).await.unwrap();
    let path: Vec<[u8; 32]> = proof
        .audit_path
        .iter()
        .map(|h| h.clone().try_into().unwrap())
        .collect();
    assert!(merkle::verify_inclusion(
        &leaf_hash,
        proof.leaf_index,
        sth.tree_size,
        &path,
        &sth.root_hash
    ));
}

#[tokio::test]
async fn verified_sth_consistency_across_growth() {
    let base = start_server().await;
    let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

    for n in 1..=4u8 {
        client
            .add_object_hash([n; 32], &json!({"n": n}))
            .await
            .unwrap();
    }
    let old = client.get_sth(Some(2)).await.unwrap();
    let new = client.get_sth(None).await.unwrap();
    assert_eq!(new.tree_size, 4);

    let proof = client.get_sth_consistency(2, 4).await.unwrap();
    let path: Vec<[u8; 32]> = proof
        .iter()
        .map(|h| h.clone().try_into().unwrap())
        .collect();
    assert!(merkle::verify_consistency(
        2,
        4,
        &old.root_hash,
        &new.root_hash,
        &path
    ));
}

#[tokio::test]
async fn entries_page_through_the_log() {
    let base = start_server().await;
    let client = LogClient::new(format!("{base}/dataset/tbl1"), WRITE_KEY);

    for n in 1..=3u8 {
        client
            .add_object_hash([n; 32], &json!({"n": n}))
            .await
            .unwrap();
    }
    let page = client.get_entries(0, 99).await.unwrap();
    assert_eq!(page.entries.len(), 3);

    let entry = client.get_entry_and_proof(3, 1).await.unwrap();
    let leaf = MerkleTreeLeaf::decode(&entry.leaf_input).unwrap();
    assert_eq!(
        leaf.payload,
        tablelog_core::rfc6962::LeafPayload::ObjectHash([2; 32])
    );
}

#[tokio::test]
async fn reads_against_missing_logs_surface_not_found() {
    let base = start_server().await;
    let client = LogClient::new(format!("{base}/dataset/never-written"), WRITE_KEY);

    let err = client.get_sth(None).await.unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let err = client.fetch_public_key_der().await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn unauthorized_add_is_a_status_error() {
    let base = start_server().await;
    let client = LogClient::new(format!("{base}/dataset/tbl1"), "wrong-key");

    let err = client
        .add_object_hash([1; 32], &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 403, .. }));
}
