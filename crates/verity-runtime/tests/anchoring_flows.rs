//! End-to-end anchoring flows over in-memory backends

use async_trait::async_trait;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use verity_anchor::{
    AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerError, LedgerReceipt, MemoryLedger,
};
use verity_core::{AnchorId, CommitmentHash, FileDigest};
use verity_persist::{
    Claim, ClaimStatus, MemoryStore, NewClaim, NewProof, Proof, RecordStore, StoreError,
};
use verity_runtime::{
    AnchorOrchestrator, CreateAnchorRequest, OrchestratorConfig, OrchestratorError, UploadedFile,
};

/// Ledger that rejects every call
struct DownLedger {
    submit_calls: AtomicUsize,
}

#[async_trait]
impl LedgerClient for DownLedger {
    async fn submit_anchor(&self, _: AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::Submission("insufficient funds".into()))
    }

    async fn read_anchor(&self, _: &AnchorId) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        Err(LedgerError::Read("node unreachable".into()))
    }

    async fn verify_anchor(&self, _: &AnchorId, _: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Read("node unreachable".into()))
    }

    fn name(&self) -> &str {
        "down"
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}

/// Store operation a `FaultyStore` refuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    InsertClaim,
    UpdateClaimStatus,
    InsertProof,
    FindProof,
    UpdateProofVerified,
}

/// Memory store that fails exactly one operation
#[derive(Debug)]
struct FaultyStore {
    inner: MemoryStore,
    fault: Fault,
}

impl FaultyStore {
    fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryStore::new(),
            fault,
        }
    }

    fn check(&self, op: Fault) -> Result<(), StoreError> {
        if self.fault != op {
            return Ok(());
        }
        match op {
            Fault::FindProof => Err(StoreError::Read("connection reset".into())),
            _ => Err(StoreError::Write("constraint violation".into())),
        }
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    fn name(&self) -> &str {
        "faulty"
    }
    async fn is_healthy(&self) -> bool {
        true
    }
    async fn insert_claim(&self, claim: NewClaim) -> Result<Uuid, StoreError> {
        self.check(Fault::InsertClaim)?;
        self.inner.insert_claim(claim).await
    }
    async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError> {
        self.inner.get_claim(id).await
    }
    async fn update_claim_status(&self, id: Uuid, status: ClaimStatus) -> Result<(), StoreError> {
        self.check(Fault::UpdateClaimStatus)?;
        self.inner.update_claim_status(id, status).await
    }
    async fn insert_proof(&self, proof: NewProof) -> Result<Uuid, StoreError> {
        self.check(Fault::InsertProof)?;
        self.inner.insert_proof(proof).await
    }
    async fn get_proof(&self, id: Uuid) -> Result<Option<Proof>, StoreError> {
        self.inner.get_proof(id).await
    }
    async fn find_proof_by_anchor_id(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<Proof>, StoreError> {
        self.check(Fault::FindProof)?;
        self.inner.find_proof_by_anchor_id(anchor_id).await
    }
    async fn update_proof_verified(&self, id: Uuid, verified: bool) -> Result<(), StoreError> {
        self.check(Fault::UpdateProofVerified)?;
        self.inner.update_proof_verified(id, verified).await
    }
}

fn faulty(fault: Fault) -> (AnchorOrchestrator, Arc<MemoryLedger>, Arc<FaultyStore>) {
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(FaultyStore::new(fault));
    let orch =
        AnchorOrchestrator::new(ledger.clone(), store.clone(), OrchestratorConfig::default());
    (orch, ledger, store)
}

fn request(files: &[&[u8]]) -> CreateAnchorRequest {
    CreateAnchorRequest {
        owner: Some("alice".into()),
        claim_type: "insurance".into(),
        description: Some("storm damage".into()),
        metadata: None,
        files: files.iter().map(|f| UploadedFile::new(f.to_vec())).collect(),
    }
}

fn memory() -> (AnchorOrchestrator, Arc<MemoryLedger>, Arc<MemoryStore>) {
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::new());
    let orch =
        AnchorOrchestrator::new(ledger.clone(), store.clone(), OrchestratorConfig::default());
    (orch, ledger, store)
}

#[tokio::test]
async fn test_two_files_anchor_end_to_end() {
    let (orch, ledger, store) = memory();

    let out = orch.create_anchor(request(&[b"a", b"b"])).await.unwrap();

    assert_eq!(
        out.file_hashes[0].as_str(),
        "0xca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb"
    );
    assert_eq!(
        out.file_hashes[1].as_str(),
        "0x3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d"
    );
    assert_eq!(
        out.commitment_hash.as_str(),
        "0x5415c4936f7265ebfb857a6d6cc5ce36d2aa7ecbc4d69a5390f135f54879f7bc"
    );
    let format = Regex::new(r"^verity_\d+_[0-9a-f]{8}$").unwrap();
    assert!(format.is_match(out.anchor_id.as_str()));
    assert!(out.anchor_id.as_str().ends_with("_8b09d559"));

    let claim = store.get_claim(out.claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Verified);
    assert_eq!(claim.user_id, "alice");
    assert_eq!(claim.file_hashes, out.file_hashes);

    let proof = store.get_proof(out.proof_id).await.unwrap().unwrap();
    assert!(proof.verified);
    assert_eq!(proof.claim_id, out.claim_id);
    assert_eq!(proof.anchor_id, out.anchor_id);
    assert_eq!(proof.transaction_hash, out.transaction_hash);

    assert_eq!(ledger.submit_calls(), 1);
    assert!(ledger
        .verify_anchor(&out.anchor_id, out.commitment_hash.as_str())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_zero_files_touch_nothing() {
    let (orch, ledger, store) = memory();

    let err = orch.create_anchor(request(&[])).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::Validation(ref m) if m == "no files provided"));
    assert!(err.is_client_error());
    assert_eq!(ledger.submit_calls(), 0);
    assert_eq!(store.claim_count().await, 0);
    assert_eq!(store.proof_count().await, 0);
}

#[tokio::test]
async fn test_ledger_failure_leaves_claim_pending() {
    let ledger = Arc::new(DownLedger {
        submit_calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MemoryStore::new());
    let orch =
        AnchorOrchestrator::new(ledger.clone(), store.clone(), OrchestratorConfig::default());

    let err = orch.create_anchor(request(&[b"a"])).await.unwrap_err();

    let claim_id = match &err {
        OrchestratorError::Anchoring {
            claim_id,
            anchor_id,
            source,
        } => {
            assert!(matches!(source, LedgerError::Submission(_)));
            assert!(anchor_id.as_str().starts_with("verity_"));
            *claim_id
        }
        other => panic!("expected anchoring error, got {:?}", other),
    };
    assert!(err.to_string().contains("insufficient funds"));

    // Exactly one attempt, no retry
    assert_eq!(ledger.submit_calls.load(Ordering::SeqCst), 1);
    let claim = store.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(store.proof_count().await, 0);
}

#[tokio::test]
async fn test_claim_write_failure_skips_ledger() {
    let (orch, ledger, store) = faulty(Fault::InsertClaim);

    let err = orch.create_anchor(request(&[b"a"])).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::StoreWrite(StoreError::Write(_))));
    assert!(err.anchor_id().is_none());
    assert_eq!(ledger.submit_calls(), 0);
    assert!(ledger.is_empty().await);
    assert_eq!(store.inner.claim_count().await, 0);
}

#[tokio::test]
async fn test_proof_write_failure_keeps_ledger_anchor() {
    let (orch, ledger, store) = faulty(Fault::InsertProof);

    let err = orch.create_anchor(request(&[b"a"])).await.unwrap_err();

    let (claim_id, anchor_id) = match &err {
        OrchestratorError::Unrecorded {
            claim_id,
            anchor_id,
            source,
        } => {
            assert!(matches!(source, StoreError::Write(_)));
            (*claim_id, anchor_id.clone())
        }
        other => panic!("expected unrecorded error, got {:?}", other),
    };
    assert_eq!(err.anchor_id(), Some(&anchor_id));
    assert!(err.to_string().contains(anchor_id.as_str()));

    // The anchor can be read back from the ledger with the id from the error
    let record = ledger.read_anchor(&anchor_id).await.unwrap().unwrap();
    assert_eq!(
        record.commitment_hash,
        CommitmentHash::compute(&[FileDigest::of(b"a")]).as_str()
    );
    assert_eq!(ledger.len().await, 1);

    let claim = store.inner.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(store.inner.proof_count().await, 0);
}

#[tokio::test]
async fn test_status_update_failure_keeps_proof() {
    let (orch, ledger, store) = faulty(Fault::UpdateClaimStatus);

    let err = orch.create_anchor(request(&[b"a"])).await.unwrap_err();

    let claim_id = match &err {
        OrchestratorError::Unrecorded { claim_id, .. } => *claim_id,
        other => panic!("expected unrecorded error, got {:?}", other),
    };
    let anchor_id = err.anchor_id().unwrap();
    assert!(ledger.read_anchor(anchor_id).await.unwrap().is_some());

    let proof = store
        .inner
        .find_proof_by_anchor_id(anchor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(proof.claim_id, claim_id);
    let claim = store.inner.get_claim(claim_id).await.unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
}

#[tokio::test]
async fn test_verify_proof_lookup_failure() {
    let (orch, _, _) = faulty(Fault::FindProof);
    let out = orch.create_anchor(request(&[b"a"])).await.unwrap();

    let err = orch
        .verify(out.anchor_id, out.commitment_hash.into_string())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::StoreRead(StoreError::Read(_))));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_verify_flag_update_failure() {
    let (orch, _, store) = faulty(Fault::UpdateProofVerified);
    let out = orch.create_anchor(request(&[b"a"])).await.unwrap();

    let err = orch
        .verify(out.anchor_id, "0xdeadbeef".to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::StoreWrite(StoreError::Write(_))));
    assert!(!err.is_client_error());
    // Flag keeps its provisional value
    assert!(store.inner.get_proof(out.proof_id).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_resubmission_gets_fresh_claim_and_proof() {
    let (orch, ledger, _) = memory();

    let first = orch.create_anchor(request(&[b"a", b"b"])).await.unwrap();
    // Ids carry whole seconds; the same commitment within one second reuses the id
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = orch.create_anchor(request(&[b"a", b"b"])).await.unwrap();

    assert_eq!(first.commitment_hash, second.commitment_hash);
    assert_ne!(first.anchor_id, second.anchor_id);
    assert_ne!(first.claim_id, second.claim_id);
    assert_ne!(first.proof_id, second.proof_id);
    assert_eq!(ledger.len().await, 2);
}

#[tokio::test]
async fn test_get_anchor_returns_ledger_record() {
    let (orch, _, _) = memory();
    let out = orch.create_anchor(request(&[b"a"])).await.unwrap();

    let record = orch.get_anchor(&out.anchor_id).await.unwrap();
    assert_eq!(record.commitment_hash, out.commitment_hash.as_str());

    let missing = orch
        .get_anchor(&AnchorId::from("verity_0_00000000"))
        .await
        .unwrap_err();
    assert!(matches!(missing, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn test_get_anchor_read_failure() {
    let orch = AnchorOrchestrator::new(
        Arc::new(DownLedger {
            submit_calls: AtomicUsize::new(0),
        }),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );
    let err = orch
        .get_anchor(&AnchorId::from("verity_1_aaaaaaaa"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::LedgerRead(_)));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_verify_never_anchored_id() {
    let (orch, _, _) = memory();

    let out = orch
        .verify(AnchorId::from("verity_0_deadbeef"), "0xabc".to_string())
        .await
        .unwrap();

    assert!(!out.verified);
    assert!(out.proof_id.is_none());
}

#[tokio::test]
async fn test_verify_is_idempotent_and_mirrors_ledger() {
    let (orch, _, store) = memory();
    let out = orch.create_anchor(request(&[b"a", b"b"])).await.unwrap();

    let wrong = CommitmentHash::compute(&[FileDigest::of(b"b"), FileDigest::of(b"a")]);
    for _ in 0..2 {
        let result = orch
            .verify(out.anchor_id.clone(), wrong.as_str().to_string())
            .await
            .unwrap();
        assert!(!result.verified);
        assert_eq!(result.proof_id, Some(out.proof_id));
        assert!(!store.get_proof(out.proof_id).await.unwrap().unwrap().verified);
    }

    for _ in 0..2 {
        let result = orch
            .verify(out.anchor_id.clone(), out.commitment_hash.as_str().to_string())
            .await
            .unwrap();
        assert!(result.verified);
        assert!(store.get_proof(out.proof_id).await.unwrap().unwrap().verified);
    }
}

#[tokio::test]
async fn test_strict_mode_leaves_proof_unverified_until_checked() {
    let ledger = Arc::new(MemoryLedger::new());
    let store = Arc::new(MemoryStore::new());
    let config = OrchestratorConfig {
        provisional_verify: false,
        ..Default::default()
    };
    let orch = AnchorOrchestrator::new(ledger, store.clone(), config);

    let out = orch.create_anchor(request(&[b"a"])).await.unwrap();
    assert!(!store.get_proof(out.proof_id).await.unwrap().unwrap().verified);

    orch.verify(out.anchor_id, out.commitment_hash.into_string())
        .await
        .unwrap();
    assert!(store.get_proof(out.proof_id).await.unwrap().unwrap().verified);
}

#[tokio::test]
async fn test_health_degrades_with_ledger_down() {
    let orch = AnchorOrchestrator::new(
        Arc::new(DownLedger {
            submit_calls: AtomicUsize::new(0),
        }),
        Arc::new(MemoryStore::new()),
        OrchestratorConfig::default(),
    );
    let body = serde_json::to_value(orch.health().await).unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["database"], "healthy");
    assert_eq!(body["services"]["blockchain"], "unhealthy");
}
