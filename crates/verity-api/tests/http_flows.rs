use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use regex::Regex;
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

use verity_anchor::{
    AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerError, LedgerReceipt, MemoryLedger,
};
use verity_api::{AppState, ServerConfig, VerityServer};
use verity_core::AnchorId;
use verity_persist::{
    Claim, ClaimStatus, MemoryStore, NewClaim, NewProof, Proof, RecordStore, StoreError,
};
use verity_runtime::{AnchorOrchestrator, OrchestratorConfig};

const BOUNDARY: &str = "verity-test-boundary";

struct Harness {
    router: Router,
    ledger: Arc<MemoryLedger>,
    store: Arc<MemoryStore>,
}

fn harness_with(config: ServerConfig) -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::new());
    let orchestrator =
        AnchorOrchestrator::new(ledger.clone(), store.clone(), OrchestratorConfig::default());
    let server = VerityServer::with_state(config, AppState::new(Arc::new(orchestrator)));
    Harness {
        router: server.router(),
        ledger,
        store,
    }
}

fn harness() -> Harness {
    harness_with(ServerConfig::default())
}

fn multipart(fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (filename, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn create_request(uri: &str, fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart(fields, files))
        .unwrap()
}

fn verify_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_and_openapi() {
    let h = harness();

    let response = h.router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["docs"], "/openapi.json");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let response = h.router.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json(response).await["paths"]["/v1/verify"].is_object());
}

#[tokio::test]
async fn test_health_with_request_id() {
    let h = harness();

    for path in ["/health", "/health/"] {
        let response = h.router.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["database"], "healthy");
        assert_eq!(body["services"]["blockchain"], "healthy");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_create_get_verify_lifecycle() {
    let h = harness();

    // 1. Create
    let response = h
        .router
        .clone()
        .oneshot(create_request(
            "/v1/anchors/",
            &[("claim_type", "insurance"), ("description", "hail damage")],
            &[("a.txt", b"a"), ("b.txt", b"b")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(
        data["commitment_hash"],
        "0x5415c4936f7265ebfb857a6d6cc5ce36d2aa7ecbc4d69a5390f135f54879f7bc"
    );
    assert_eq!(
        data["file_hashes"],
        serde_json::json!([
            "0xca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
            "0x3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d"
        ])
    );
    assert_eq!(data["message"], "Claim anchored successfully to blockchain");
    let anchor_id = data["anchor_id"].as_str().unwrap().to_string();
    assert!(Regex::new(r"^verity_\d+_[0-9a-f]{8}$")
        .unwrap()
        .is_match(&anchor_id));
    let proof_id = data["proof_id"].as_str().unwrap().to_string();
    let claim_id: uuid::Uuid = data["claim_id"].as_str().unwrap().parse().unwrap();

    let claim = h.store.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.user_id, "demo_user");
    assert_eq!(claim.description.as_deref(), Some("hail damage"));

    // 2. Get
    let response = h
        .router
        .clone()
        .oneshot(get(&format!("/v1/anchors/{}", anchor_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["data"]["commitment_hash"], data["commitment_hash"]);
    let metadata: serde_json::Value =
        serde_json::from_str(body["data"]["metadata"].as_str().unwrap()).unwrap();
    assert_eq!(metadata["claim_id"], claim_id.to_string());
    assert_eq!(metadata["file_count"], 2);

    // 3. Verify, matching and mismatching
    let response = h
        .router
        .clone()
        .oneshot(verify_request(
            "/v1/verify/",
            serde_json::json!({
                "anchor_id": anchor_id,
                "commitment_hash": data["commitment_hash"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["data"]["verified"], true);
    assert_eq!(body["data"]["proof_id"], proof_id.as_str());
    assert_eq!(body["data"]["message"], "Proof verified successfully");

    let response = h
        .router
        .oneshot(verify_request(
            "/v1/verify",
            serde_json::json!({ "anchor_id": anchor_id, "commitment_hash": "0xdeadbeef" }),
        ))
        .await
        .unwrap();
    let body = json(response).await;
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(body["data"]["message"], "Proof verification failed");
    assert_eq!(h.ledger.submit_calls(), 1);
}

#[tokio::test]
async fn test_create_without_files_is_rejected() {
    let h = harness();

    let response = h
        .router
        .oneshot(create_request(
            "/v1/anchors",
            &[("claim_type", "insurance")],
            &[],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["detail"], "no files provided");
    assert_eq!(h.ledger.submit_calls(), 0);
    assert_eq!(h.store.claim_count().await, 0);
}

#[tokio::test]
async fn test_create_input_validation() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(create_request("/v1/anchors", &[], &[("a.txt", b"a")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["detail"], "claim_type is required");

    let response = h
        .router
        .oneshot(create_request(
            "/v1/anchors",
            &[("claim_type", "insurance"), ("metadata", "{broken")],
            &[("a.txt", b"a")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.store.claim_count().await, 0);
}

#[tokio::test]
async fn test_query_fields_and_client_owner() {
    let h = harness();

    let mut request = create_request(
        "/v1/anchors?claim_type=legal&metadata=%7B%22case%22%3A7%7D",
        &[],
        &[("contract.pdf", b"%PDF-1.7")],
    );
    request
        .headers_mut()
        .insert("x-client-id", "acme-corp".parse().unwrap());

    let response = h.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let claim_id: uuid::Uuid = json(response).await["data"]["claim_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let claim = h.store.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.user_id, "acme-corp");
    assert_eq!(claim.claim_type, "legal");
    assert_eq!(claim.metadata.unwrap()["case"], 7);
}

#[tokio::test]
async fn test_unknown_anchor_and_unanchored_verify() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(get("/v1/anchors/verity_0_00000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["detail"], "Anchor not found");

    let response = h
        .router
        .oneshot(verify_request(
            "/v1/verify",
            serde_json::json!({ "anchor_id": "verity_0_deadbeef", "commitment_hash": "0xabc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["data"]["verified"], false);
    assert!(body["data"]["proof_id"].is_null());
}

#[tokio::test]
async fn test_malformed_verify_body() {
    let h = harness();
    let response = h
        .router
        .oneshot(verify_request(
            "/v1/verify",
            serde_json::json!({ "anchor_id": "verity_1_aaaaaaaa" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_untrusted_host_is_rejected() {
    let h = harness_with(ServerConfig {
        allowed_hosts: vec!["api.verity.dev".to_string()],
        ..Default::default()
    });

    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "evil.example")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "api.verity.dev:443")
        .body(Body::empty())
        .unwrap();
    let response = h.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Ledger that accepts nothing
struct RejectingLedger;

#[async_trait]
impl LedgerClient for RejectingLedger {
    async fn submit_anchor(&self, _: AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        Err(LedgerError::Submission("NotEnoughBalance".into()))
    }
    async fn read_anchor(&self, _: &AnchorId) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        Err(LedgerError::Read("timeout".into()))
    }
    async fn verify_anchor(&self, _: &AnchorId, _: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Read("timeout".into()))
    }
    fn name(&self) -> &str {
        "rejecting"
    }
    async fn is_healthy(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_ledger_failures_surface_as_500() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = AnchorOrchestrator::new(
        Arc::new(RejectingLedger),
        store.clone(),
        OrchestratorConfig::default(),
    );
    let router = VerityServer::with_state(
        ServerConfig::default(),
        AppState::new(Arc::new(orchestrator)),
    )
    .router();

    let response = router
        .clone()
        .oneshot(create_request(
            "/v1/anchors",
            &[("claim_type", "insurance")],
            &[("a.txt", b"a")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Failed to create anchor"));
    assert!(detail.contains("NotEnoughBalance"));
    // Claim was recorded and stays pending
    assert_eq!(store.claim_count().await, 1);

    let response = router
        .clone()
        .oneshot(get("/v1/anchors/verity_1_aaaaaaaa"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = router.oneshot(get("/health")).await.unwrap();
    let body = json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["blockchain"], "unhealthy");
}

/// Memory store whose proof lookups and proof writes fail
#[derive(Debug, Default)]
struct BrokenProofStore {
    inner: MemoryStore,
}

#[async_trait]
impl RecordStore for BrokenProofStore {
    fn name(&self) -> &str {
        "broken-proof"
    }
    async fn is_healthy(&self) -> bool {
        true
    }
    async fn insert_claim(&self, claim: NewClaim) -> Result<uuid::Uuid, StoreError> {
        self.inner.insert_claim(claim).await
    }
    async fn get_claim(&self, id: uuid::Uuid) -> Result<Option<Claim>, StoreError> {
        self.inner.get_claim(id).await
    }
    async fn update_claim_status(
        &self,
        id: uuid::Uuid,
        status: ClaimStatus,
    ) -> Result<(), StoreError> {
        self.inner.update_claim_status(id, status).await
    }
    async fn insert_proof(&self, _: NewProof) -> Result<uuid::Uuid, StoreError> {
        Err(StoreError::Write("disk full".into()))
    }
    async fn get_proof(&self, id: uuid::Uuid) -> Result<Option<Proof>, StoreError> {
        self.inner.get_proof(id).await
    }
    async fn find_proof_by_anchor_id(&self, _: &AnchorId) -> Result<Option<Proof>, StoreError> {
        Err(StoreError::Read("connection reset".into()))
    }
    async fn update_proof_verified(&self, _: uuid::Uuid, _: bool) -> Result<(), StoreError> {
        Err(StoreError::Write("disk full".into()))
    }
}

#[tokio::test]
async fn test_store_failures_surface_as_500() {
    let ledger = Arc::new(MemoryLedger::new());
    let orchestrator = AnchorOrchestrator::new(
        ledger.clone(),
        Arc::new(BrokenProofStore::default()),
        OrchestratorConfig::default(),
    );
    let router = VerityServer::with_state(
        ServerConfig::default(),
        AppState::new(Arc::new(orchestrator)),
    )
    .router();

    // Anchored on the ledger, proof not recorded: the detail names the anchor id
    let response = router
        .clone()
        .oneshot(create_request(
            "/v1/anchors",
            &[("claim_type", "insurance")],
            &[("a.txt", b"a")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Failed to create anchor"));
    let anchor_id = Regex::new(r"verity_\d+_[0-9a-f]{8}")
        .unwrap()
        .find(&detail)
        .unwrap()
        .as_str()
        .to_string();
    assert_eq!(ledger.len().await, 1);

    // Verify reaches the ledger, then fails reading the stored proof
    let response = router
        .oneshot(verify_request(
            "/v1/verify",
            serde_json::json!({
                "anchor_id": anchor_id,
                "commitment_hash": "0xca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("Failed to verify proof"));
    assert!(detail.contains("connection reset"));
}
