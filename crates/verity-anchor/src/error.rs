//! Error types for ledger operations

use thiserror::Error;

/// Errors that can occur while talking to the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A state-changing call failed or was rejected (network, funds, program, timeout)
    #[error("Ledger submission failed: {0}")]
    Submission(String),

    /// A read-only call could not be completed
    #[error("Ledger read failed: {0}")]
    Read(String),

    /// Client could not be constructed from its configuration
    #[error("Ledger misconfigured: {0}")]
    Configuration(String),
}
