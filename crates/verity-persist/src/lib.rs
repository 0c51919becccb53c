//! # Verity Persistence
//!
//! Off-chain records for claims and their anchoring proofs.
//!
//! Supports:
//! - In-memory (for testing)
//! - SQLite (for single-node)
//! - PostgREST / Supabase (hosted tables over HTTP)

pub mod backend;
pub mod memory;
pub mod models;

#[cfg(feature = "postgrest")]
pub mod postgrest;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{RecordStore, StoreError};
pub use memory::MemoryStore;
pub use models::{Claim, ClaimStatus, NewClaim, NewProof, Proof};

#[cfg(feature = "postgrest")]
pub use postgrest::PostgrestStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConfig, SqliteStore};
