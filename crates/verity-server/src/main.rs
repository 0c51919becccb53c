//! Verity Server - standalone entry point for the Verity API
//!
//! Thin wrapper around `verity-api` that reads the environment, builds the
//! configured ledger and record store once, and serves until signalled.

use anyhow::Result;
use verity_api::{AppConfig, VerityServer};

#[tokio::main]
async fn main() -> Result<()> {
    verity_api::server::init_tracing();

    tracing::info!("Starting Verity server v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    let server = VerityServer::new(config).await.map_err(|e| {
        tracing::error!("Failed to initialize server: {}", e);
        e
    })?;

    server.run().await.map_err(|e| {
        tracing::error!("Server error during execution: {}", e);
        e
    })?;

    Ok(())
}
