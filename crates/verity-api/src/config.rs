//! Startup configuration from environment variables
//!
//! Everything is read once at process start. Missing ledger or store
//! credentials are fatal.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use verity_anchor::NearConfig;
use verity_runtime::OrchestratorConfig;
use zeroize::Zeroizing;

use crate::server::ServerConfig;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Which ledger backend to run against
#[derive(Debug, Clone)]
pub enum LedgerSettings {
    Near(NearConfig),
    /// Development ledger appending JSON Lines to a file confined to `base_dir`
    File { path: PathBuf, base_dir: PathBuf },
    Memory,
}

/// Which record store to use
#[derive(Clone)]
pub enum StoreSettings {
    Sqlite(String),
    Postgrest {
        url: String,
        api_key: Zeroizing<String>,
    },
    Memory,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(url) => f.debug_tuple("Sqlite").field(url).finish(),
            Self::Postgrest { url, .. } => f
                .debug_struct("Postgrest")
                .field("url", url)
                .field("api_key", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ledger: LedgerSettings,
    pub store: StoreSettings,
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Read the process environment; empty values count as unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ledger = ledger_settings(&lookup)?;
        let store = store_settings(&lookup)?;

        let port: u16 = match lookup("VERITY_PORT").or_else(|| lookup("PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("PORT", format!("'{}' is not a port", raw)))?,
            None => 3001,
        };

        let server = ServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(parse_or(&lookup, "VERITY_TIMEOUT_SECS", 60)?),
            max_body_size: parse_or(&lookup, "VERITY_MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            frontend_origins: list(
                lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:5173".to_string()),
            ),
            allowed_hosts: list(lookup("VERITY_ALLOWED_HOSTS").unwrap_or_else(|| "*".to_string())),
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            anchor_prefix: lookup("VERITY_ANCHOR_PREFIX").unwrap_or(defaults.anchor_prefix),
            default_owner: lookup("VERITY_OWNER").unwrap_or(defaults.default_owner),
            provisional_verify: match lookup("VERITY_PROVISIONAL_VERIFY") {
                Some(raw) => parse_bool("VERITY_PROVISIONAL_VERIFY", &raw)?,
                None => defaults.provisional_verify,
            },
            health_timeout: defaults.health_timeout,
        };

        Ok(Self {
            ledger,
            store,
            server,
            orchestrator,
        })
    }
}

fn ledger_settings<F>(lookup: &F) -> Result<LedgerSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let kind = lookup("VERITY_LEDGER").unwrap_or_else(|| "near".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "near" => {
            let account_id = required(lookup, "NEAR_ACCOUNT_ID")?;
            let private_key = Zeroizing::new(required(lookup, "NEAR_PRIVATE_KEY")?);

            let mut config = NearConfig::new(account_id, private_key.as_str());
            if let Some(network_id) = lookup("NEAR_NETWORK_ID") {
                config.network_id = network_id;
            }
            if let Some(node_url) = lookup("NEAR_NODE_URL") {
                config.node_url = node_url;
            }
            if let Some(contract_id) = lookup("NEAR_CONTRACT_ID") {
                config.contract_id = contract_id;
            }
            config.gas = parse_or(lookup, "NEAR_GAS", config.gas)?;
            config.deposit_yocto = parse_or(lookup, "NEAR_DEPOSIT_YOCTO", config.deposit_yocto)?;
            config.timeout = Duration::from_secs(parse_or(
                lookup,
                "NEAR_TIMEOUT_SECS",
                config.timeout.as_secs(),
            )?);
            Ok(LedgerSettings::Near(config))
        }
        "file" => Ok(LedgerSettings::File {
            path: PathBuf::from(
                lookup("VERITY_LEDGER_FILE").unwrap_or_else(|| "anchors.jsonl".to_string()),
            ),
            base_dir: PathBuf::from(lookup("VERITY_LEDGER_DIR").unwrap_or_else(|| ".".to_string())),
        }),
        "memory" => Ok(LedgerSettings::Memory),
        other => Err(ConfigError::invalid(
            "VERITY_LEDGER",
            format!("unknown ledger '{}' (expected near, file or memory)", other),
        )),
    }
}

fn store_settings<F>(lookup: &F) -> Result<StoreSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let postgrest = |url: String| -> Result<StoreSettings, ConfigError> {
        let api_key = required(lookup, "SUPABASE_ANON_KEY")?;
        Ok(StoreSettings::Postgrest {
            url,
            api_key: Zeroizing::new(api_key),
        })
    };

    match lookup("DATABASE_URL") {
        Some(url) if url == "memory" => Ok(StoreSettings::Memory),
        Some(url) if url.starts_with("sqlite:") => Ok(StoreSettings::Sqlite(url)),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => postgrest(url),
        Some(url) => Err(ConfigError::invalid(
            "DATABASE_URL",
            format!("unsupported store URL '{}'", url),
        )),
        None => match lookup("SUPABASE_URL") {
            Some(url) => postgrest(url),
            None => Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string())),
        },
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{}'", raw))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("'{}' is not a boolean", raw))),
    }
}

fn list(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
