//! End-to-end tests against a live listener.
//!
//! Each test boots a server over an in-memory store on an ephemeral port and
//! drives it with a real HTTP client, the same way submitters and auditors
//! do.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use sha2::{Digest, Sha256};

use tablelog_core::api::{
    AddChainResponse, GetEntriesResponse, GetProofByHashResponse, GetSthConsistencyResponse,
    GetSthResponse, MetadataResponse,
};
use tablelog_core::merkle;
use tablelog_core::rfc6962::MerkleTreeLeaf;
use tablelog_core::verifier::LogVerifier;
use tablelog_server::http::router;
use tablelog_server::storage::SqliteStore;
use tablelog_server::submission::ApiKeyValidator;
use tablelog_core::table_name::TableNameValidator;
use tablelog_server::AppState;

const WRITE_KEY: &str = "secret";

struct TestServer {
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(table_names: TableNameValidator) -> Self {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let state = AppState::new(
            "test-account",
            Arc::clone(&store) as Arc<dyn tablelog_server::storage::StorageWriter>,
            store as Arc<dyn tablelog_server::storage::VerifiableLog>,
            Arc::new(ApiKeyValidator::new(WRITE_KEY)),
            table_names,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    async fn start_default() -> Self {
        Self::start(
            TableNameValidator::create_named("insecure-skip-validation", "").unwrap(),
        )
        .await
    }

    fn url(&self, log: &str, op: &str) -> String {
        format!("{}/dataset/{log}/ct/v1/{op}", self.base)
    }

    async fn add(&self, log: &str, hash: [u8; 32], extra: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(log, "add-objecthash"))
            .header("Authorization", WRITE_KEY)
            .json(&json!({"hash": BASE64.encode(hash), "extra_data": extra}))
            .send()
            .await
            .unwrap()
    }

    async fn add_ok(&self, log: &str, hash: [u8; 32], extra: serde_json::Value) -> AddChainResponse {
        let resp = self.add(log, hash, extra).await;
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn get_sth(&self, log: &str) -> GetSthResponse {
        let resp = self
            .client
            .get(self.url(log, "get-sth"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

#[tokio::test]
async fn first_write_creates_log_and_resubmission_is_idempotent() {
    let server = TestServer::start_default().await;

    let first = server
        .add_ok("tbl1", [0x41; 32], json!({"x": "y"}))
        .await;
    assert!(!first.signature.is_empty());
    assert_eq!(first.sct_version, 0);

    // The log ID is the SHA-256 of the metadata key.
    let metadata: MetadataResponse = server
        .client
        .get(server.url("tbl1", "metadata"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let expected_id: [u8; 32] = Sha256::digest(&metadata.key).into();
    assert_eq!(first.id, expected_id.to_vec());

    // Byte-identical on replay.
    let second = server
        .add_ok("tbl1", [0x41; 32], json!({"x": "y"}))
        .await;
    assert_eq!(second.signature, first.signature);
    assert_eq!(second.timestamp, first.timestamp);

    // And the SCT verifies against the log key.
    let verifier = LogVerifier::from_public_key_der(&metadata.key).unwrap();
    let leaf = MerkleTreeLeaf::object_hash([0x41; 32], first.timestamp);
    let sct = tablelog_core::rfc6962::SignedCertificateTimestamp {
        log_id: expected_id,
        timestamp: first.timestamp,
        extensions: Vec::new(),
        signature: tablelog_core::rfc6962::DigitallySigned::decode(&first.signature).unwrap(),
    };
    verifier.verify_sct(&sct, &leaf).unwrap();
}

#[tokio::test]
async fn reads_against_unknown_logs_are_404() {
    let server = TestServer::start_default().await;

    for op in [
        "metadata",
        "get-sth",
        "get-sth-consistency?first=1&second=2",
        "get-entries?start=0&end=10",
    ] {
        let resp = server
            .client
            .get(server.url("unknown", op))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "{op}");
    }
}

#[tokio::test]
async fn add_requires_the_write_key() {
    let server = TestServer::start_default().await;

    let resp = server
        .client
        .post(server.url("tbl1", "add-objecthash"))
        .header("Authorization", "wrong")
        .json(&json!({"hash": BASE64.encode([1u8; 32])}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // A rejected write must not create the log.
    let resp = server
        .client
        .get(server.url("tbl1", "get-sth"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn identical_hash_fields_share_one_sct() {
    let server = TestServer::start_default().await;

    // Internal and null fields differ, but the submitted hash is the dup key.
    let a = server
        .add_ok("tbl1", [0x55; 32], json!({"a": 1, "b": null, "_id": 7}))
        .await;
    let b = server.add_ok("tbl1", [0x55; 32], json!({"a": 1})).await;
    assert_eq!(a.signature, b.signature);
    assert_eq!(a.timestamp, b.timestamp);
}

#[tokio::test]
async fn get_objecthash_returns_the_issued_sct() {
    let server = TestServer::start_default().await;
    let issued = server.add_ok("tbl1", [0x66; 32], json!({"k": "v"})).await;

    let fetched: AddChainResponse = server
        .client
        .get(format!(
            "{}?hash={}",
            server.url("tbl1", "get-objecthash"),
            urlencode(&BASE64.encode([0x66u8; 32]))
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, issued);

    let missing = server
        .client
        .get(format!(
            "{}?hash={}",
            server.url("tbl1", "get-objecthash"),
            urlencode(&BASE64.encode([0x67u8; 32]))
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn sth_is_frozen_per_size_and_consistent_over_growth() {
    let server = TestServer::start_default().await;

    server.add_ok("tbl1", [1; 32], json!({"n": 1})).await;
    server.add_ok("tbl1", [2; 32], json!({"n": 2})).await;
    let sth2 = server.get_sth("tbl1").await;
    assert_eq!(sth2.tree_size, 2);

    // Size zero is well-defined: the empty tree head.
    let empty: GetSthResponse = server
        .client
        .get(format!("{}?tree_size=0", server.url("tbl1", "get-sth")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty.tree_size, 0);
    assert_eq!(
        empty.sha256_root_hash,
        Sha256::digest(b"").to_vec(),
        "empty tree root is SHA256 of the empty string"
    );

    // A size beyond the head is a client error.
    let resp = server
        .client
        .get(format!("{}?tree_size=99", server.url("tbl1", "get-sth")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Still byte-identical on a second observation.
    let again = server.get_sth("tbl1").await;
    assert_eq!(again, sth2);

    server.add_ok("tbl1", [3; 32], json!({"n": 3})).await;
    let sth3 = server.get_sth("tbl1").await;
    assert_eq!(sth3.tree_size, 3);

    // STH signature verifies.
    let metadata: MetadataResponse = server
        .client
        .get(server.url("tbl1", "metadata"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let verifier = LogVerifier::from_public_key_der(&metadata.key).unwrap();
    let root: [u8; 32] = sth3.sha256_root_hash.clone().try_into().unwrap();
    let ds = tablelog_core::rfc6962::DigitallySigned::decode(&sth3.tree_head_signature).unwrap();
    verifier
        .verify_sth(sth3.tree_size, sth3.timestamp, &root, &ds)
        .unwrap();

    // The old head extends into the new one.
    let proof: GetSthConsistencyResponse = server
        .client
        .get(format!(
            "{}?first=2&second=3",
            server.url("tbl1", "get-sth-consistency")
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let path: Vec<[u8; 32]> = proof
        .consistency
        .iter()
        .map(|h| h.clone().try_into().unwrap())
        .collect();
    let old_root: [u8; 32] = sth2.sha256_root_hash.clone().try_into().unwrap();
    assert!(merkle::verify_consistency(2, 3, &old_root, &root, &path));
}

#[tokio::test]
async fn proof_by_hash_reconstructs_the_published_root() {
    let server = TestServer::start_default().await;

    for n in 1..=5u8 {
        server
            .add_ok("tbl1", [n; 32], json!({"n": n}))
            .await;
    }
    let sth = server.get_sth("tbl1").await;
    let root: [u8; 32] = sth.sha256_root_hash.clone().try_into().unwrap();

    let leaf = MerkleTreeLeaf::object_hash([3; 32], leaf_timestamp(&server, 3).await);
    let leaf_hash = leaf.leaf_hash().unwrap();

    let proof: GetProofByHashResponse = server
        .client
        .get(format!(
            "{}?tree_size={}&hash={}",
            server.url("tbl1", "get-proof-by-hash"),
            sth.tree_size,
            urlencode(&BASE64.encode(leaf_hash))
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

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
        &root
    ));
}

/// Fetches the leaf timestamp the log assigned to the entry carrying `[n; 32]`.
async fn leaf_timestamp(server: &TestServer, n: u8) -> u64 {
    let entries: GetEntriesResponse = server
        .client
        .get(format!("{}?start=0&end=99", server.url("tbl1", "get-entries")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    for entry in &entries.entries {
        let leaf = MerkleTreeLeaf::decode(&entry.leaf_input).unwrap();
        if let tablelog_core::rfc6962::LeafPayload::ObjectHash(hash) = leaf.payload {
            if hash == [n; 32] {
                return leaf.timestamp;
            }
        }
    }
    panic!("no leaf with hash [{n}; 32]");
}

#[tokio::test]
async fn get_entries_caps_pages_at_one_hundred() {
    let server = TestServer::start_default().await;

    for n in 0..120u32 {
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&n.to_be_bytes());
        server.add_ok("tbl1", hash, json!({"n": n})).await;
    }

    let page: GetEntriesResponse = server
        .client
        .get(format!("{}?start=0&end=200", server.url("tbl1", "get-entries")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 100);

    // An empty range is a 400.
    let resp = server
        .client
        .get(format!(
            "{}?start=500&end=600",
            server.url("tbl1", "get-entries")
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn get_entry_and_proof_returns_leaf_and_path() {
    let server = TestServer::start_default().await;
    for n in 1..=4u8 {
        server.add_ok("tbl1", [n; 32], json!({"n": n})).await;
    }
    let sth = server.get_sth("tbl1").await;
    let root: [u8; 32] = sth.sha256_root_hash.clone().try_into().unwrap();

    let resp: tablelog_core::api::GetEntryAndProofResponse = server
        .client
        .get(format!(
            "{}?tree_size=4&leaf_index=2",
            server.url("tbl1", "get-entry-and-proof")
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let leaf = MerkleTreeLeaf::decode(&resp.leaf_input).unwrap();
    assert_eq!(leaf.payload, tablelog_core::rfc6962::LeafPayload::ObjectHash([3; 32]));

    let path: Vec<[u8; 32]> = resp
        .audit_path
        .iter()
        .map(|h| h.clone().try_into().unwrap())
        .collect();
    assert!(merkle::verify_inclusion(
        &leaf.leaf_hash().unwrap(),
        2,
        4,
        &path,
        &root
    ));
}

#[tokio::test]
async fn whitelist_rejects_unlisted_logs_with_400() {
    let server =
        TestServer::start(TableNameValidator::create_named("whitelist", "a,b").unwrap()).await;

    let resp = server
        .client
        .get(server.url("c", "get-sth"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn trailing_slash_redirect_and_options_succeed() {
    let server = TestServer::start_default().await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!("{}/dataset/tbl1", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 301);
    assert_eq!(
        resp.headers().get("location").unwrap().to_str().unwrap(),
        "/dataset/tbl1/"
    );

    let resp = server
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/anything/at/all", server.base),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

fn urlencode(raw: &str) -> String {
    raw.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
}
