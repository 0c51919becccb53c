//! In-memory record store (for testing)

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use verity_core::AnchorId;

use crate::backend::{RecordStore, StoreError};
use crate::models::{Claim, ClaimStatus, NewClaim, NewProof, Proof};

/// In-memory claims and proofs
///
/// Proofs keep insertion order so lookups by anchor id return the earliest.
#[derive(Debug, Default)]
pub struct MemoryStore {
    claims: RwLock<HashMap<Uuid, Claim>>,
    proofs: RwLock<Vec<Proof>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn claim_count(&self) -> usize {
        self.claims.read().await.len()
    }

    pub async fn proof_count(&self) -> usize {
        self.proofs.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn insert_claim(&self, claim: NewClaim) -> Result<Uuid, StoreError> {
        let claim = Claim::from_new(claim, Utc::now());
        let id = claim.id;
        self.claims.write().await.insert(id, claim);
        Ok(id)
    }

    async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError> {
        Ok(self.claims.read().await.get(&id).cloned())
    }

    async fn update_claim_status(&self, id: Uuid, status: ClaimStatus) -> Result<(), StoreError> {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("claim {}", id)))?;
        claim.status = status;
        claim.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_proof(&self, proof: NewProof) -> Result<Uuid, StoreError> {
        // Same referential check the relational backends enforce
        if !self.claims.read().await.contains_key(&proof.claim_id) {
            return Err(StoreError::Write(format!(
                "claim {} does not exist",
                proof.claim_id
            )));
        }
        let proof = Proof::from_new(proof, Utc::now());
        let id = proof.id;
        self.proofs.write().await.push(proof);
        Ok(id)
    }

    async fn get_proof(&self, id: Uuid) -> Result<Option<Proof>, StoreError> {
        Ok(self
            .proofs
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_proof_by_anchor_id(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<Proof>, StoreError> {
        Ok(self
            .proofs
            .read()
            .await
            .iter()
            .find(|p| &p.anchor_id == anchor_id)
            .cloned())
    }

    async fn update_proof_verified(&self, id: Uuid, verified: bool) -> Result<(), StoreError> {
        let mut proofs = self.proofs.write().await;
        let proof = proofs
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("proof {}", id)))?;
        proof.verified = verified;
        Ok(())
    }
}
