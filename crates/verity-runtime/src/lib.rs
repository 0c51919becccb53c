//! # Verity Runtime
//!
//! Composes hashing, id generation, the ledger client and the record store
//! into the three anchoring flows: create, get and verify.

pub mod error;
pub mod health;
pub mod orchestrator;

pub use error::OrchestratorError;
pub use health::{HealthReport, OverallStatus, ServiceHealth, ServicesHealth};
pub use orchestrator::{
    AnchorOrchestrator, CreateAnchorOutcome, CreateAnchorRequest, OrchestratorConfig,
    UploadedFile, VerifyOutcome,
};
