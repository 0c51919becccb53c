//! SQLite record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use verity_core::{AnchorId, CommitmentHash, FileDigest};

use crate::backend::{RecordStore, StoreError};
use crate::models::{Claim, ClaimStatus, NewClaim, NewProof, Proof};

/// Tables mirror the hosted `claims`/`proofs` layout. JSON columns are TEXT.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS claims (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        claim_type TEXT NOT NULL,
        description TEXT,
        file_hashes TEXT NOT NULL,
        metadata TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS proofs (
        id TEXT PRIMARY KEY,
        claim_id TEXT NOT NULL REFERENCES claims(id),
        anchor_id TEXT NOT NULL,
        commitment_hash TEXT NOT NULL,
        block_height INTEGER,
        transaction_hash TEXT,
        verified INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_proofs_anchor_id ON proofs(anchor_id)",
];

/// SQLite configuration options
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL (e.g., "sqlite:verity.db" or "sqlite::memory:")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Enable WAL journal mode for better concurrency
    pub wal_mode: bool,
    /// Enable foreign key enforcement
    pub foreign_keys: bool,
    /// Busy timeout in seconds
    pub busy_timeout_secs: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:verity.db?mode=rwc".to_string(),
            max_connections: 5,
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_secs: 30,
        }
    }
}

impl SqliteConfig {
    /// Create config for in-memory database (testing)
    ///
    /// One connection only: every SQLite memory connection is its own database.
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_secs: 5,
        }
    }
}

/// SQLite record store
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a store with default config; `:memory:` URLs get the memory profile
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let config = if url.contains(":memory:") {
            SqliteConfig {
                url: url.to_string(),
                ..SqliteConfig::memory()
            }
        } else {
            SqliteConfig {
                url: url.to_string(),
                ..Default::default()
            }
        };
        Self::new_with_config(config).await
    }

    pub async fn new_with_config(config: SqliteConfig) -> Result<Self, StoreError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true);

        if config.foreign_keys {
            options = options.pragma("foreign_keys", "ON");
        }
        options = options.busy_timeout(Duration::from_secs(config.busy_timeout_secs.into()));
        if config.wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| StoreError::Connection(format!("schema setup failed: {}", e)))?;
        }

        info!(url = %config.url, wal = config.wal_mode, "Connected to SQLite");

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn read_err(e: sqlx::Error) -> StoreError {
    StoreError::Read(e.to_string())
}

fn write_err(e: sqlx::Error) -> StoreError {
    StoreError::Write(e.to_string())
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Serialization(format!("bad id '{}': {}", raw, e)))
}

fn claim_from_row(row: &SqliteRow) -> Result<Claim, StoreError> {
    let id: String = row.try_get("id").map_err(read_err)?;
    let file_hashes: String = row.try_get("file_hashes").map_err(read_err)?;
    let metadata: Option<String> = row.try_get("metadata").map_err(read_err)?;
    let status: String = row.try_get("status").map_err(read_err)?;

    let file_hashes: Vec<FileDigest> = serde_json::from_str(&file_hashes)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let metadata = metadata
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(Claim {
        id: parse_uuid(&id)?,
        user_id: row.try_get("user_id").map_err(read_err)?,
        claim_type: row.try_get("claim_type").map_err(read_err)?,
        description: row.try_get("description").map_err(read_err)?,
        file_hashes,
        metadata,
        status: ClaimStatus::from_str(&status).map_err(StoreError::Serialization)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(read_err)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(read_err)?,
    })
}

fn proof_from_row(row: &SqliteRow) -> Result<Proof, StoreError> {
    let id: String = row.try_get("id").map_err(read_err)?;
    let claim_id: String = row.try_get("claim_id").map_err(read_err)?;
    let anchor_id: String = row.try_get("anchor_id").map_err(read_err)?;
    let commitment_hash: String = row.try_get("commitment_hash").map_err(read_err)?;
    let block_height: Option<i64> = row.try_get("block_height").map_err(read_err)?;

    Ok(Proof {
        id: parse_uuid(&id)?,
        claim_id: parse_uuid(&claim_id)?,
        anchor_id: AnchorId::from(anchor_id),
        commitment_hash: CommitmentHash::from_rendered(commitment_hash),
        block_height: block_height.map(|h| h as u64),
        transaction_hash: row.try_get("transaction_hash").map_err(read_err)?,
        verified: row.try_get("verified").map_err(read_err)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(read_err)?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT id FROM claims LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .is_ok()
    }

    async fn insert_claim(&self, claim: NewClaim) -> Result<Uuid, StoreError> {
        let claim = Claim::from_new(claim, Utc::now());
        let file_hashes = serde_json::to_string(&claim.file_hashes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let metadata = claim
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO claims (id, user_id, claim_type, description, file_hashes, metadata, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(claim.id.to_string())
        .bind(&claim.user_id)
        .bind(&claim.claim_type)
        .bind(&claim.description)
        .bind(file_hashes)
        .bind(metadata)
        .bind(claim.status.as_str())
        .bind(claim.created_at)
        .bind(claim.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(claim.id)
    }

    async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>, StoreError> {
        let row = sqlx::query("SELECT * FROM claims WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        row.as_ref().map(claim_from_row).transpose()
    }

    async fn update_claim_status(&self, id: Uuid, status: ClaimStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE claims SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("claim {}", id)));
        }
        Ok(())
    }

    async fn insert_proof(&self, proof: NewProof) -> Result<Uuid, StoreError> {
        let proof = Proof::from_new(proof, Utc::now());

        sqlx::query(
            "INSERT INTO proofs (id, claim_id, anchor_id, commitment_hash, block_height, transaction_hash, verified, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(proof.id.to_string())
        .bind(proof.claim_id.to_string())
        .bind(proof.anchor_id.as_str())
        .bind(proof.commitment_hash.as_str())
        .bind(proof.block_height.map(|h| h as i64))
        .bind(&proof.transaction_hash)
        .bind(proof.verified)
        .bind(proof.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(proof.id)
    }

    async fn get_proof(&self, id: Uuid) -> Result<Option<Proof>, StoreError> {
        let row = sqlx::query("SELECT * FROM proofs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;
        row.as_ref().map(proof_from_row).transpose()
    }

    async fn find_proof_by_anchor_id(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<Proof>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM proofs WHERE anchor_id = ? ORDER BY created_at ASC, rowid ASC LIMIT 1",
        )
        .bind(anchor_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;
        row.as_ref().map(proof_from_row).transpose()
    }

    async fn update_proof_verified(&self, id: Uuid, verified: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE proofs SET verified = ? WHERE id = ?")
            .bind(verified)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("proof {}", id)));
        }
        Ok(())
    }
}
