//! Record store trait and error types

use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;
use verity_core::AnchorId;

use crate::models::{Claim, ClaimStatus, NewClaim, NewProof, Proof};

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store write failed: {0}")]
    Write(String),

    #[error("Store read failed: {0}")]
    Read(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Claims and proofs table store (object safe)
///
/// Implementations never retry; every failure is returned to the caller.
#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Check if backend is reachable
    async fn is_healthy(&self) -> bool;

    /// Insert a claim and return its generated id
    async fn insert_claim(&self, claim: NewClaim) -> Result<Uuid, StoreError>;

    async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError>;

    /// Set a claim's lifecycle status and bump `updated_at`
    async fn update_claim_status(&self, id: Uuid, status: ClaimStatus) -> Result<(), StoreError>;

    /// Insert a proof and return its generated id
    async fn insert_proof(&self, proof: NewProof) -> Result<Uuid, StoreError>;

    async fn get_proof(&self, id: Uuid) -> Result<Option<Proof>, StoreError>;

    /// Earliest proof recorded for `anchor_id`, if any
    async fn find_proof_by_anchor_id(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<Proof>, StoreError>;

    async fn update_proof_verified(&self, id: Uuid, verified: bool) -> Result<(), StoreError>;
}
