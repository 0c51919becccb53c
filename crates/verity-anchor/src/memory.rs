//! In-memory ledger
//!
//! Holds anchors in a map for tests and local runs. Writes are accept-first:
//! a second submission for an existing anchor id is rejected.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use verity_core::AnchorId;

use crate::backend::{AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerReceipt};
use crate::error::LedgerError;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    anchors: RwLock<HashMap<String, LedgerAnchorRecord>>,
    submit_calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `submit_anchor` calls seen, accepted or not
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of anchors currently stored
    pub async fn len(&self) -> usize {
        self.anchors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.anchors.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn submit_anchor(
        &self,
        submission: AnchorSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        let mut anchors = self.anchors.write().await;
        if anchors.contains_key(submission.anchor_id.as_str()) {
            return Err(LedgerError::Submission(format!(
                "anchor {} already exists",
                submission.anchor_id
            )));
        }

        let mut extra = serde_json::Map::new();
        extra.insert("timestamp".to_string(), now.timestamp().into());
        anchors.insert(
            submission.anchor_id.as_str().to_string(),
            LedgerAnchorRecord {
                anchor_id: Some(submission.anchor_id.as_str().to_string()),
                commitment_hash: submission.commitment_hash.as_str().to_string(),
                metadata: submission.metadata.clone(),
                extra,
            },
        );

        Ok(LedgerReceipt {
            backend: self.name().to_string(),
            anchor_id: submission.anchor_id,
            commitment_hash: submission.commitment_hash,
            transaction_hash: Some(format!("memory-tx-{}", call)),
            block_hash: None,
            block_height: Some(call as u64),
            submitted_at: now,
        })
    }

    async fn read_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        Ok(self.anchors.read().await.get(anchor_id.as_str()).cloned())
    }

    async fn verify_anchor(
        &self,
        anchor_id: &AnchorId,
        commitment_hash: &str,
    ) -> Result<bool, LedgerError> {
        let anchors = self.anchors.read().await;
        Ok(anchors.get(anchor_id.as_str()).is_some_and(|record| {
            record
                .commitment_hash
                .as_bytes()
                .ct_eq(commitment_hash.as_bytes())
                .into()
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
