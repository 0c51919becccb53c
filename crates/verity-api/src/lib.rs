//! # Verity API
//!
//! HTTP surface for content commitment anchoring.
//!
//! Features:
//! - Axum-based web server
//! - Multipart file upload for anchor creation
//! - Tower middleware (request id, tracing, CORS, trusted hosts, timeouts)
//! - OpenAPI document
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{AppConfig, ConfigError, LedgerSettings, StoreSettings};
pub use error::{ApiError, ApiResult};
pub use server::{ServerConfig, VerityServer};
pub use state::AppState;
