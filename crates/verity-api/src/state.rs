//! Application State

use std::sync::Arc;
use verity_runtime::AnchorOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AnchorOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<AnchorOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Get the orchestrator (cloned Arc for sharing)
    pub fn orchestrator(&self) -> Arc<AnchorOrchestrator> {
        self.orchestrator.clone()
    }
}
