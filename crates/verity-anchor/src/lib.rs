//! # Verity Anchor
//!
//! The only layer that talks to the ledger.
//!
//! Every backend anchors a commitment hash under an [`AnchorId`](verity_core::AnchorId),
//! reads the stored record back, and asks the ledger whether a presented
//! commitment matches what was anchored.
//!
//! ## Supported Backends
//!
//! - **NearLedger**: signed `anchor` function calls against a NEAR contract,
//!   `get_anchor` / `verify` view calls for reads
//! - **FileLedger**: local append-only JSON Lines log (development)
//! - **MemoryLedger**: in-process map (tests)
//!
//! Submissions are never retried here. A blind retry after an ambiguous
//! failure could anchor the same id twice.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verity_anchor::{AnchorSubmission, LedgerClient, MemoryLedger};
//! use verity_core::{AnchorIdGenerator, CommitmentHash, FileDigest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new();
//!     let commitment = CommitmentHash::compute(&[FileDigest::of(b"contract.pdf")]);
//!     let anchor_id = AnchorIdGenerator::default().generate(&commitment);
//!
//!     let receipt = ledger
//!         .submit_anchor(AnchorSubmission::new(anchor_id.clone(), commitment.clone()))
//!         .await?;
//!     println!("Anchored {} via {}", receipt.anchor_id, receipt.backend);
//!
//!     assert!(ledger.verify_anchor(&anchor_id, commitment.as_str()).await?);
//!     Ok(())
//! }
//! ```

mod backend;
mod error;
mod memory;

#[cfg(feature = "file")]
mod file;

#[cfg(feature = "near")]
mod near;

pub use backend::{AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerReceipt};
pub use error::LedgerError;
pub use memory::MemoryLedger;

#[cfg(feature = "file")]
pub use file::FileLedger;

#[cfg(feature = "near")]
pub use near::{NearConfig, NearLedger};
