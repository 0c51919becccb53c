//! Claim and proof records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use verity_core::{AnchorId, CommitmentHash, FileDigest};

/// Lifecycle of a claim
///
/// A claim starts `Pending` and becomes `Verified` once its proof is
/// recorded. Nothing in the anchoring flow sets `Failed`; it exists for
/// operators marking claims by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Verified,
    Failed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Verified => "verified",
            ClaimStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ClaimStatus::Pending),
            "verified" => Ok(ClaimStatus::Verified),
            "failed" => Ok(ClaimStatus::Failed),
            other => Err(format!("unknown claim status '{}'", other)),
        }
    }
}

/// A claim as submitted, before the store assigns identity
#[derive(Debug, Clone, PartialEq)]
pub struct NewClaim {
    pub user_id: String,
    pub claim_type: String,
    pub description: Option<String>,
    /// Digests in upload order
    pub file_hashes: Vec<FileDigest>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Stored claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub user_id: String,
    pub claim_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub file_hashes: Vec<FileDigest>,
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Materialize a pending claim with a fresh id
    pub fn from_new(new: NewClaim, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            claim_type: new.claim_type,
            description: new.description,
            file_hashes: new.file_hashes,
            metadata: new.metadata,
            status: ClaimStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A proof as produced by a ledger submission
#[derive(Debug, Clone, PartialEq)]
pub struct NewProof {
    pub claim_id: Uuid,
    pub anchor_id: AnchorId,
    pub commitment_hash: CommitmentHash,
    pub block_height: Option<u64>,
    pub transaction_hash: Option<String>,
    pub verified: bool,
}

/// Stored proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub anchor_id: AnchorId,
    pub commitment_hash: CommitmentHash,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Proof {
    pub fn from_new(new: NewProof, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            claim_id: new.claim_id,
            anchor_id: new.anchor_id,
            commitment_hash: new.commitment_hash,
            block_height: new.block_height,
            transaction_hash: new.transaction_hash,
            verified: new.verified,
            created_at: now,
        }
    }
}
