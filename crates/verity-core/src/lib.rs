//! # Verity Core
//!
//! Content commitment primitives shared by every Verity crate.
//!
//! - [`FileDigest`]: SHA-256 fingerprint of one file, rendered `0x` + hex
//! - [`CommitmentHash`]: SHA-256 over an ordered set of file digests
//! - [`AnchorId`]: identifier of one anchoring event on the ledger
//!
//! ## Quick Start
//!
//! ```rust
//! use verity_core::{AnchorIdGenerator, CommitmentHash, FileDigest};
//!
//! let digests = vec![FileDigest::of(b"a"), FileDigest::of(b"b")];
//! let commitment = CommitmentHash::compute(&digests);
//! let anchor_id = AnchorIdGenerator::new("verity").generate(&commitment);
//!
//! assert!(commitment.as_str().starts_with("0x"));
//! assert!(anchor_id.as_str().starts_with("verity_"));
//! ```

pub mod anchor_id;
pub mod digest;

pub use anchor_id::{AnchorId, AnchorIdGenerator, DEFAULT_ANCHOR_PREFIX};
pub use digest::{CommitmentHash, FileDigest, HEX_PREFIX};
