//! Core ledger client trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verity_core::{AnchorId, CommitmentHash};

use crate::error::LedgerError;

/// Arguments of the ledger `anchor` entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorSubmission {
    pub anchor_id: AnchorId,
    pub commitment_hash: CommitmentHash,
    /// Free-form metadata string stored next to the commitment
    pub metadata: Option<String>,
}

impl AnchorSubmission {
    pub fn new(anchor_id: AnchorId, commitment_hash: CommitmentHash) -> Self {
        Self {
            anchor_id,
            commitment_hash,
            metadata: None,
        }
    }

    /// Attach metadata (usually a JSON document)
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Receipt for an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerReceipt {
    /// Backend that performed the submission
    pub backend: String,
    pub anchor_id: AnchorId,
    pub commitment_hash: CommitmentHash,
    /// Ledger transaction identifier, when the backend has one
    pub transaction_hash: Option<String>,
    /// Block that included the transaction, when known
    pub block_hash: Option<String>,
    pub block_height: Option<u64>,
    pub submitted_at: DateTime<Utc>,
}

/// The ledger's view of one anchor
///
/// Fields the ledger returns beyond the commitment and metadata are kept in
/// `extra` so the record can be handed back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAnchorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
    pub commitment_hash: String,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Trait for ledger backends
///
/// Implementations are scoped to one program and one submitting account,
/// fixed at construction. They hold no per-call mutable state beyond their
/// connection and must not retry submissions.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Anchor a commitment under `anchor_id` (state-changing)
    async fn submit_anchor(
        &self,
        submission: AnchorSubmission,
    ) -> Result<LedgerReceipt, LedgerError>;

    /// Read the anchor record back; `None` when the id was never anchored
    async fn read_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<LedgerAnchorRecord>, LedgerError>;

    /// Ask the ledger whether `commitment_hash` matches the stored record
    ///
    /// Returns `false` for a mismatch or an absent record.
    async fn verify_anchor(
        &self,
        anchor_id: &AnchorId,
        commitment_hash: &str,
    ) -> Result<bool, LedgerError>;

    /// Get the human-readable name of this backend
    fn name(&self) -> &str;

    /// Check if the ledger is reachable
    async fn is_healthy(&self) -> bool;
}
