//! Orchestrator error types

use uuid::Uuid;
use verity_anchor::LedgerError;
use verity_core::AnchorId;
use verity_persist::StoreError;

/// Failures of the anchoring flows
///
/// Lower-layer errors are carried untouched. Failures after an anchor id was
/// generated also name the claim and the anchor id, so the ledger record can
/// be read back or the submission retried under the same id.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    StoreWrite(StoreError),

    #[error("{0}")]
    StoreRead(StoreError),

    #[error("{0}")]
    LedgerRead(LedgerError),

    #[error("Anchor not found: {0}")]
    NotFound(String),

    /// Ledger submission failed; the claim stays `pending`
    #[error("Anchoring claim {claim_id} as {anchor_id} failed: {source}")]
    Anchoring {
        claim_id: Uuid,
        anchor_id: AnchorId,
        #[source]
        source: LedgerError,
    },

    /// The ledger accepted the anchor but the proof or claim status was not stored
    #[error("Claim {claim_id} anchored as {anchor_id} but not recorded: {source}")]
    Unrecorded {
        claim_id: Uuid,
        anchor_id: AnchorId,
        #[source]
        source: StoreError,
    },
}

impl OrchestratorError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_))
    }

    /// Anchor id generated before the failure, if any
    pub fn anchor_id(&self) -> Option<&AnchorId> {
        match self {
            Self::Anchoring { anchor_id, .. } | Self::Unrecorded { anchor_id, .. } => {
                Some(anchor_id)
            }
            _ => None,
        }
    }
}
