//! Anchor identifiers
//!
//! Format: `{prefix}_{unix seconds}_{8 hex chars}`. The timestamp keeps ids
//! sortable by creation time; the suffix is derived from the commitment so
//! two anchors created in the same second only collide if their commitments
//! share a 32-bit hash prefix. Uniqueness is probabilistic.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::{sha256_hex, CommitmentHash};

/// Prefix used when none is configured
pub const DEFAULT_ANCHOR_PREFIX: &str = "verity";

/// Number of hash-derived hex chars at the end of an id
const SUFFIX_LEN: usize = 8;

/// Identifier of one anchoring event, used as the ledger lookup key
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(String);

impl AnchorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for AnchorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AnchorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnchorId({})", self.0)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives anchor ids from commitment hashes
#[derive(Debug, Clone)]
pub struct AnchorIdGenerator {
    prefix: String,
}

impl Default for AnchorIdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR_PREFIX)
    }
}

impl AnchorIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generate an id stamped with the current wall-clock second
    pub fn generate(&self, commitment: &CommitmentHash) -> AnchorId {
        self.generate_at(commitment, Utc::now().timestamp())
    }

    /// Generate an id for an explicit unix timestamp
    pub fn generate_at(&self, commitment: &CommitmentHash, unix_secs: i64) -> AnchorId {
        let suffix_source = sha256_hex(commitment.hex_body().as_bytes());
        AnchorId(format!(
            "{}_{}_{}",
            self.prefix,
            unix_secs,
            &suffix_source[..SUFFIX_LEN]
        ))
    }
}
