//! Verity API server with graceful shutdown

use axum::{extract::DefaultBodyLimit, middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use verity_anchor::{FileLedger, LedgerClient, MemoryLedger, NearLedger};
use verity_persist::{MemoryStore, PostgrestStore, RecordStore, SqliteStore};
use verity_runtime::AnchorOrchestrator;

use crate::config::{AppConfig, LedgerSettings, StoreSettings};
use crate::error::ApiError;
use crate::middleware::{
    body_limit_layer, cors_layer, request_id_middleware, timeout_layer, tracing_middleware,
    trusted_host_middleware, AllowedHosts,
};
use crate::routes::api_router;
use crate::state::AppState;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Request timeout
    pub timeout: Duration,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// CORS origins; `*` allows any
    pub frontend_origins: Vec<String>,
    /// Accepted `Host` header values; `*` allows any
    pub allowed_hosts: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            timeout: Duration::from_secs(60),
            max_body_size: 25 * 1024 * 1024,
            frontend_origins: vec!["http://localhost:5173".to_string()],
            allowed_hosts: vec!["*".to_string()],
        }
    }
}

/// Verity API server
pub struct VerityServer {
    config: ServerConfig,
    app_state: AppState,
}

impl VerityServer {
    /// Construct ledger and store once and wire them into the orchestrator
    pub async fn new(config: AppConfig) -> Result<Self, ApiError> {
        let ledger = build_ledger(config.ledger)?;
        let store = build_store(config.store, config.server.timeout).await?;

        tracing::info!(
            ledger = ledger.name(),
            store = store.name(),
            "Backends initialized"
        );

        let orchestrator = AnchorOrchestrator::new(ledger, store, config.orchestrator);
        Ok(Self::with_state(config.server, AppState::new(Arc::new(orchestrator))))
    }

    /// Use an already assembled state (tests, embedding)
    pub fn with_state(config: ServerConfig, app_state: AppState) -> Self {
        Self { config, app_state }
    }

    /// Get the configured router
    pub fn router(&self) -> Router {
        let allowed_hosts = AllowedHosts::new(self.config.allowed_hosts.clone());

        // Layers run outermost-last: host check first, then tracing, request id, CORS
        api_router(self.app_state.clone())
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .layer(body_limit_layer(self.config.max_body_size))
            .layer(timeout_layer(self.config.timeout))
            .layer(cors_layer(&self.config.frontend_origins))
            .layer(middleware::from_fn(request_id_middleware))
            .layer(middleware::from_fn(tracing_middleware))
            .layer(middleware::from_fn_with_state(
                allowed_hosts,
                trusted_host_middleware,
            ))
    }

    /// Run the server with graceful shutdown
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Verity API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }
}

fn build_ledger(settings: LedgerSettings) -> Result<Arc<dyn LedgerClient>, ApiError> {
    Ok(match settings {
        LedgerSettings::Near(near) => Arc::new(
            NearLedger::new(near)
                .map_err(|e| ApiError::Internal(format!("Ledger init failed: {}", e)))?,
        ),
        LedgerSettings::File { path, base_dir } => {
            tracing::warn!(path = %path.display(), "Using file ledger - NOT for production!");
            Arc::new(
                FileLedger::with_base_dir(path, base_dir)
                    .map_err(|e| ApiError::Internal(format!("Ledger init failed: {}", e)))?,
            )
        }
        LedgerSettings::Memory => {
            tracing::warn!("Using in-memory ledger - anchors are lost on restart");
            Arc::new(MemoryLedger::new())
        }
    })
}

async fn build_store(
    settings: StoreSettings,
    timeout: Duration,
) -> Result<Arc<dyn RecordStore>, ApiError> {
    Ok(match settings {
        StoreSettings::Sqlite(url) => Arc::new(
            SqliteStore::new(&url)
                .await
                .map_err(|e| ApiError::Internal(format!("DB init failed: {}", e)))?,
        ),
        StoreSettings::Postgrest { url, api_key } => Arc::new(
            PostgrestStore::new(&url, api_key.as_str(), timeout)
                .map_err(|e| ApiError::Internal(format!("DB init failed: {}", e)))?,
        ),
        StoreSettings::Memory => {
            tracing::warn!("Using in-memory record store - records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,verity_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
