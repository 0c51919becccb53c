//! NEAR ledger backend
//!
//! Anchors commitments by calling the `anchor` method of a fixed contract
//! with a signed function-call transaction. Reads go through the
//! `get_anchor` and `verify` view methods at `final` finality.

mod rpc;
mod transaction;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use verity_core::AnchorId;
use zeroize::Zeroizing;

use crate::backend::{AnchorSubmission, LedgerAnchorRecord, LedgerClient, LedgerReceipt};
use crate::error::LedgerError;
use rpc::{AccessKeyView, BlockView, CallResult, FinalExecutionOutcome, RpcClient};
use transaction::{decode_hash, FunctionCall, InMemorySigner, Transaction};

/// 30 Tgas
pub const DEFAULT_GAS: u64 = 30_000_000_000_000;
/// 0.1 NEAR, the anti-spam deposit attached to every anchor call
pub const DEFAULT_DEPOSIT_YOCTO: u128 = 100_000_000_000_000_000_000_000;
pub const DEFAULT_CONTRACT_ID: &str = "verity_anchor.near";

/// Connection and account settings, fixed for the life of the client
#[derive(Clone)]
pub struct NearConfig {
    pub network_id: String,
    pub node_url: String,
    /// Submitting account
    pub account_id: String,
    /// `ed25519:<base58>` secret key of `account_id`
    pub private_key: Zeroizing<String>,
    /// Anchor contract
    pub contract_id: String,
    pub gas: u64,
    pub deposit_yocto: u128,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl NearConfig {
    /// Mainnet defaults for the given account
    pub fn new(account_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            network_id: "mainnet".to_string(),
            node_url: "https://rpc.mainnet.near.org".to_string(),
            account_id: account_id.into(),
            private_key: Zeroizing::new(private_key.into()),
            contract_id: DEFAULT_CONTRACT_ID.to_string(),
            gas: DEFAULT_GAS,
            deposit_yocto: DEFAULT_DEPOSIT_YOCTO,
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for NearConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NearConfig")
            .field("network_id", &self.network_id)
            .field("node_url", &self.node_url)
            .field("account_id", &self.account_id)
            .field("private_key", &"[REDACTED]")
            .field("contract_id", &self.contract_id)
            .field("gas", &self.gas)
            .field("deposit_yocto", &self.deposit_yocto)
            .finish()
    }
}

/// NEAR contract ledger
pub struct NearLedger {
    network_id: String,
    contract_id: String,
    gas: u64,
    deposit_yocto: u128,
    signer: InMemorySigner,
    rpc: RpcClient,
}

impl fmt::Debug for NearLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NearLedger")
            .field("network_id", &self.network_id)
            .field("contract_id", &self.contract_id)
            .field("account_id", &self.signer.account_id())
            .finish()
    }
}

impl NearLedger {
    /// Build the client; fails if the key cannot be parsed
    pub fn new(config: NearConfig) -> Result<Self, LedgerError> {
        let signer = InMemorySigner::from_secret_key(&config.account_id, &config.private_key)?;
        let rpc = RpcClient::new(&config.node_url, config.timeout)?;

        tracing::info!(
            network = %config.network_id,
            node = %config.node_url,
            account = %config.account_id,
            contract = %config.contract_id,
            "NEAR ledger client configured"
        );

        Ok(Self {
            network_id: config.network_id,
            contract_id: config.contract_id,
            gas: config.gas,
            deposit_yocto: config.deposit_yocto,
            signer,
            rpc,
        })
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    async fn view<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        args: serde_json::Value,
    ) -> Result<T, LedgerError> {
        let args_base64 = base64::engine::general_purpose::STANDARD.encode(args.to_string());
        let result: CallResult = self
            .rpc
            .call(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": self.contract_id,
                    "method_name": method,
                    "args_base64": args_base64,
                }),
                LedgerError::Read,
            )
            .await?;

        if let Some(err) = result.error {
            return Err(LedgerError::Read(format!("{} failed: {}", method, err)));
        }

        serde_json::from_slice(&result.result)
            .map_err(|e| LedgerError::Read(format!("{} returned invalid JSON: {}", method, e)))
    }

    async fn access_key(&self) -> Result<AccessKeyView, LedgerError> {
        self.rpc
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": self.signer.account_id(),
                    "public_key": self.signer.public_key().to_string(),
                }),
                LedgerError::Submission,
            )
            .await
    }

    async fn block_height(&self, block_hash: &str) -> Option<u64> {
        let block: Result<BlockView, _> = self
            .rpc
            .call("block", json!({ "block_id": block_hash }), LedgerError::Read)
            .await;
        block.ok().map(|b| b.header.height)
    }
}

#[async_trait]
impl LedgerClient for NearLedger {
    async fn submit_anchor(
        &self,
        submission: AnchorSubmission,
    ) -> Result<LedgerReceipt, LedgerError> {
        let access_key = self.access_key().await?;
        let block_hash = decode_hash(&access_key.block_hash).map_err(LedgerError::Submission)?;

        let args = json!({
            "anchor_id": submission.anchor_id.as_str(),
            "commitment_hash": submission.commitment_hash.as_str(),
            "metadata": submission.metadata,
        });

        let tx = Transaction {
            signer_id: self.signer.account_id().to_string(),
            public_key: self.signer.public_key(),
            nonce: access_key.nonce + 1,
            receiver_id: self.contract_id.clone(),
            block_hash,
            actions: vec![FunctionCall {
                method_name: "anchor".to_string(),
                args: args.to_string().into_bytes(),
                gas: self.gas,
                deposit: self.deposit_yocto,
            }],
        };

        let (signed, tx_hash) = self
            .signer
            .sign(tx)
            .map_err(|e| LedgerError::Submission(format!("encode transaction: {}", e)))?;
        let encoded = signed
            .to_base64()
            .map_err(|e| LedgerError::Submission(format!("encode transaction: {}", e)))?;

        tracing::debug!(
            anchor_id = %submission.anchor_id,
            tx_hash = %bs58::encode(tx_hash).into_string(),
            "Broadcasting anchor transaction"
        );

        let outcome: FinalExecutionOutcome = self
            .rpc
            .call("broadcast_tx_commit", json!([encoded]), LedgerError::Submission)
            .await?;

        if let Some(failure) = outcome.status.get("Failure") {
            return Err(LedgerError::Submission(format!(
                "anchor transaction failed: {}",
                failure
            )));
        }
        if outcome.status.get("SuccessValue").is_none() {
            return Err(LedgerError::Submission(format!(
                "anchor transaction did not complete: {}",
                outcome.status
            )));
        }

        let block_height = self
            .block_height(&outcome.transaction_outcome.block_hash)
            .await;

        tracing::info!(
            anchor_id = %submission.anchor_id,
            tx = %outcome.transaction_outcome.id,
            block_height = ?block_height,
            "Commitment anchored on NEAR"
        );

        Ok(LedgerReceipt {
            backend: self.name().to_string(),
            anchor_id: submission.anchor_id,
            commitment_hash: submission.commitment_hash,
            transaction_hash: Some(outcome.transaction_outcome.id),
            block_hash: Some(outcome.transaction_outcome.block_hash),
            block_height,
            submitted_at: Utc::now(),
        })
    }

    async fn read_anchor(
        &self,
        anchor_id: &AnchorId,
    ) -> Result<Option<LedgerAnchorRecord>, LedgerError> {
        self.view("get_anchor", json!({ "anchor_id": anchor_id.as_str() }))
            .await
    }

    async fn verify_anchor(
        &self,
        anchor_id: &AnchorId,
        commitment_hash: &str,
    ) -> Result<bool, LedgerError> {
        self.view(
            "verify",
            json!({
                "anchor_id": anchor_id.as_str(),
                "commitment_hash": commitment_hash,
            }),
        )
        .await
    }

    fn name(&self) -> &str {
        "near"
    }

    async fn is_healthy(&self) -> bool {
        let status: Result<serde_json::Value, _> = self
            .rpc
            .call("status", json!([]), LedgerError::Read)
            .await;
        status.is_ok()
    }
}
