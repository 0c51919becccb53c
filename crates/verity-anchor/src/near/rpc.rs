//! Minimal NEAR JSON-RPC transport

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LedgerError;

#[derive(Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'a str,
    id: &'a str,
    method: &'a str,
    params: T,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({})", data)?;
        }
        Ok(())
    }
}

/// Result of a `call_function` view query
#[derive(Debug, Deserialize)]
pub(crate) struct CallResult {
    #[serde(default)]
    pub result: Vec<u8>,
    /// Older nodes report contract errors inline instead of as RPC errors
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessKeyView {
    pub nonce: u64,
    pub block_hash: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FinalExecutionOutcome {
    pub status: serde_json::Value,
    pub transaction_outcome: TransactionOutcome,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionOutcome {
    pub id: String,
    pub block_hash: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockView {
    pub header: BlockHeader,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockHeader {
    pub height: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("verity-anchor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Issue one JSON-RPC call; every failure is mapped through `fail`
    pub async fn call<P, T>(
        &self,
        method: &str,
        params: P,
        fail: fn(String) -> LedgerError,
    ) -> Result<T, LedgerError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "verity",
            method,
            params,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| fail(e.to_string()))?;

        let parsed: JsonRpcResponse<T> = serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                fail(format!("malformed {} response: {}", method, e))
            } else {
                fail(format!("NEAR RPC returned HTTP {}", status))
            }
        })?;

        if let Some(err) = parsed.error {
            return Err(fail(err.to_string()));
        }

        parsed
            .result
            .ok_or_else(|| fail(format!("{} response has no result", method)))
    }
}
