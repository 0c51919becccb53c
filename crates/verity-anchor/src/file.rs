//! File-based ledger
//!
//! Appends anchor entries to a local JSON Lines file for development and
//! single-node deployments without a chain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use verity_core::AnchorId;

use crate::backend::{AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerReceipt};
use crate::error::LedgerError;

/// One line of the ledger file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    anchor_id: String,
    commitment_hash: String,
    metadata: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerAnchorRecord {
    fn from(entry: LedgerEntry) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "timestamp".to_string(),
            entry.submitted_at.timestamp().into(),
        );
        Self {
            anchor_id: Some(entry.anchor_id),
            commitment_hash: entry.commitment_hash,
            metadata: entry.metadata,
            extra,
        }
    }
}

/// File-based ledger backend
///
/// Writes are accept-first: an anchor id already present in the file is
/// rejected. Appends are serialized through a process-local lock.
///
/// # Security
/// Use `with_base_dir()` for deployments to prevent path traversal.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedger {
    /// Create a new file ledger (no path validation)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a file ledger confined to `base_dir`
    ///
    /// # Errors
    /// Returns `LedgerError::Configuration` if the path contains `..` or
    /// resolves outside the base directory.
    pub fn with_base_dir(
        path: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self, LedgerError> {
        let path = path.into();
        let base_dir = base_dir.into();

        if path.to_string_lossy().contains("..") {
            return Err(LedgerError::Configuration(
                "Path traversal detected: '..' not allowed in ledger path".to_string(),
            ));
        }

        // The file may not exist yet; fall back to the raw base path
        let base_canonical = base_dir.canonicalize().unwrap_or(base_dir);
        let resolved = if path.is_absolute() {
            path
        } else {
            base_canonical.join(&path)
        };

        let parent = resolved
            .parent()
            .map(|p| p.canonicalize().unwrap_or_else(|_| p.to_path_buf()))
            .unwrap_or_else(|| resolved.clone());

        if !parent.starts_with(&base_canonical) {
            return Err(LedgerError::Configuration(format!(
                "Path '{}' is outside allowed directory '{}'",
                resolved.display(),
                base_canonical.display()
            )));
        }

        Ok(Self::new(resolved))
    }

    /// Get the path to the ledger file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn find(&self, anchor_id: &str) -> std::io::Result<Option<LedgerEntry>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) if entry.anchor_id == anchor_id => return Ok(Some(entry)),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable ledger line"
                ),
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl LedgerClient for FileLedger {
    async fn submit_anchor(
        &self,
        submission: AnchorSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let existing = self
            .find(submission.anchor_id.as_str())
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;
        if existing.is_some() {
            return Err(LedgerError::Submission(format!(
                "anchor {} already exists",
                submission.anchor_id
            )));
        }

        let entry = LedgerEntry {
            anchor_id: submission.anchor_id.as_str().to_string(),
            commitment_hash: submission.commitment_hash.as_str().to_string(),
            metadata: submission.metadata,
            submitted_at: Utc::now(),
        };

        let mut json =
            serde_json::to_string(&entry).map_err(|e| LedgerError::Submission(e.to_string()))?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| LedgerError::Submission(e.to_string()))?;

        Ok(LedgerReceipt {
            backend: self.name().to_string(),
            anchor_id: submission.anchor_id,
            commitment_hash: submission.commitment_hash,
            transaction_hash: None,
            block_hash: None,
            block_height: None,
            submitted_at: entry.submitted_at,
        })
    }

    async fn read_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        let entry = self
            .find(anchor_id.as_str())
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;
        Ok(entry.map(LedgerAnchorRecord::from))
    }

    async fn verify_anchor(
        &self,
        anchor_id: &AnchorId,
        commitment_hash: &str,
    ) -> Result<bool, LedgerError> {
        use subtle::ConstantTimeEq;

        let entry = self
            .find(anchor_id.as_str())
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;

        Ok(entry.is_some_and(|stored| {
            stored
                .commitment_hash
                .as_bytes()
                .ct_eq(commitment_hash.as_bytes())
                .into()
        }))
    }

    fn name(&self) -> &str {
        "file"
    }

    async fn is_healthy(&self) -> bool {
        // Check if we can write to the directory
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return fs::create_dir_all(parent).await.is_ok();
            }
        }
        true
    }
}
