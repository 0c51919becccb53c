//! Anchoring orchestrator - create, read and verify anchors

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use verity_anchor::{AnchorSubmission, LedgerAnchorRecord, LedgerClient};
use verity_core::{AnchorId, AnchorIdGenerator, CommitmentHash, FileDigest, DEFAULT_ANCHOR_PREFIX};
use verity_persist::{ClaimStatus, NewClaim, NewProof, RecordStore, StoreError};

use crate::error::OrchestratorError;
use crate::health::{probe, HealthReport};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Prefix of generated anchor ids
    pub anchor_prefix: String,
    /// Owner recorded when a request names none
    pub default_owner: String,
    /// Record new proofs as verified at submission time
    pub provisional_verify: bool,
    /// Upper bound for each dependency health probe
    pub health_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            anchor_prefix: DEFAULT_ANCHOR_PREFIX.to_string(),
            default_owner: "demo_user".to_string(),
            provisional_verify: true,
            health_timeout: Duration::from_secs(5),
        }
    }
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: None,
            content: content.into(),
        }
    }
}

/// Input of the create flow; files are hashed in the order given
#[derive(Debug, Clone, Default)]
pub struct CreateAnchorRequest {
    pub owner: Option<String>,
    pub claim_type: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAnchorOutcome {
    pub claim_id: Uuid,
    pub anchor_id: AnchorId,
    pub commitment_hash: CommitmentHash,
    pub file_hashes: Vec<FileDigest>,
    pub proof_id: Uuid,
    pub transaction_hash: Option<String>,
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub verified: bool,
    pub anchor_id: AnchorId,
    pub commitment_hash: String,
    /// Stored proof reconciled with the ledger answer, if any
    pub proof_id: Option<Uuid>,
}

/// Composes hasher, id generator, ledger and store
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct AnchorOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn RecordStore>,
    ids: AnchorIdGenerator,
    config: OrchestratorConfig,
}

impl AnchorOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn RecordStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            ids: AnchorIdGenerator::new(config.anchor_prefix.clone()),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<dyn LedgerClient> {
        self.ledger.clone()
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Hash, record, anchor and prove a set of files
    ///
    /// A ledger failure leaves the claim `pending`. A store failure after a
    /// successful submission does not undo the ledger write; it surfaces as
    /// `Unrecorded` naming the anchor id.
    pub async fn create_anchor(
        &self,
        request: CreateAnchorRequest,
    ) -> Result<CreateAnchorOutcome, OrchestratorError> {
        if request.files.is_empty() {
            return Err(OrchestratorError::Validation("no files provided".to_string()));
        }
        if request.claim_type.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "claim_type is required".to_string(),
            ));
        }

        let file_hashes: Vec<FileDigest> = request
            .files
            .iter()
            .map(|f| FileDigest::of(&f.content))
            .collect();
        let commitment = CommitmentHash::compute(&file_hashes);
        let anchor_id = self.ids.generate(&commitment);
        let file_count = file_hashes.len();

        debug!(%anchor_id, %commitment, file_count, "Computed commitment");

        let claim_type = request.claim_type;
        let claim_id = self
            .store
            .insert_claim(NewClaim {
                user_id: request
                    .owner
                    .unwrap_or_else(|| self.config.default_owner.clone()),
                claim_type: claim_type.clone(),
                description: request.description,
                file_hashes: file_hashes.clone(),
                metadata: request.metadata,
            })
            .await
            .map_err(OrchestratorError::StoreWrite)?;

        let ledger_metadata = json!({
            "claim_id": claim_id,
            "claim_type": claim_type,
            "file_count": file_count,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let receipt = self
            .ledger
            .submit_anchor(
                AnchorSubmission::new(anchor_id.clone(), commitment.clone())
                    .with_metadata(ledger_metadata.to_string()),
            )
            .await
            .map_err(|source| {
                warn!(
                    %claim_id,
                    %anchor_id,
                    error = %source,
                    "Ledger submission failed; claim left pending"
                );
                OrchestratorError::Anchoring {
                    claim_id,
                    anchor_id: anchor_id.clone(),
                    source,
                }
            })?;

        let unrecorded = |source: StoreError| {
            error!(
                %claim_id,
                %anchor_id,
                error = %source,
                "Anchor is on the ledger but was not recorded"
            );
            OrchestratorError::Unrecorded {
                claim_id,
                anchor_id: anchor_id.clone(),
                source,
            }
        };

        let proof_id = self
            .store
            .insert_proof(NewProof {
                claim_id,
                anchor_id: anchor_id.clone(),
                commitment_hash: commitment.clone(),
                block_height: receipt.block_height,
                transaction_hash: receipt.transaction_hash.clone(),
                verified: self.config.provisional_verify,
            })
            .await
            .map_err(unrecorded)?;

        self.store
            .update_claim_status(claim_id, ClaimStatus::Verified)
            .await
            .map_err(unrecorded)?;

        info!(
            %claim_id,
            %anchor_id,
            %proof_id,
            backend = %receipt.backend,
            "Claim anchored"
        );

        Ok(CreateAnchorOutcome {
            claim_id,
            anchor_id,
            commitment_hash: commitment,
            file_hashes,
            proof_id,
            transaction_hash: receipt.transaction_hash,
            block_height: receipt.block_height,
        })
    }

    /// Ledger record for `anchor_id`, unchanged
    pub async fn get_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<LedgerAnchorRecord, OrchestratorError> {
        self.ledger
            .read_anchor(anchor_id)
            .await
            .map_err(OrchestratorError::LedgerRead)?
            .ok_or_else(|| OrchestratorError::NotFound(anchor_id.to_string()))
    }

    /// Ask the ledger, then mirror its answer onto the stored proof
    ///
    /// Repeating a verify yields the same answer and leaves the proof flag
    /// equal to it.
    pub async fn verify(
        &self,
        anchor_id: AnchorId,
        commitment_hash: String,
    ) -> Result<VerifyOutcome, OrchestratorError> {
        let verified = self
            .ledger
            .verify_anchor(&anchor_id, &commitment_hash)
            .await
            .map_err(OrchestratorError::LedgerRead)?;

        let proof = self
            .store
            .find_proof_by_anchor_id(&anchor_id)
            .await
            .map_err(OrchestratorError::StoreRead)?;

        let proof_id = match proof {
            Some(proof) => {
                self.store
                    .update_proof_verified(proof.id, verified)
                    .await
                    .map_err(OrchestratorError::StoreWrite)?;
                Some(proof.id)
            }
            None => None,
        };

        info!(%anchor_id, verified, proof_id = ?proof_id, "Verification complete");

        Ok(VerifyOutcome {
            verified,
            anchor_id,
            commitment_hash,
            proof_id,
        })
    }

    /// Probe store and ledger concurrently
    pub async fn health(&self) -> HealthReport {
        let timeout = self.config.health_timeout;
        let (database, blockchain) = tokio::join!(
            probe(self.store.is_healthy(), timeout),
            probe(self.ledger.is_healthy(), timeout),
        );
        HealthReport::new(database, blockchain)
    }
}
