//! Default Soroban client implementation using reqwest.
//!
//! Implements [`SorobanBackend`] against a Soroban RPC server (JSON-RPC 2.0)
//! for ledger queries and simulation, and a Horizon server for submission.
//!
//! # Quick Start
//!
//! ```ignore
//! use soroban_deploy_rs::{DeployConfig, Deployer, Salt, SigningKeypair, SorobanClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeployConfig::testnet("CB...")?;
//! let client = SorobanClient::new(&config)?;
//! let keypair = SigningKeypair::from_secret("S...")?;
//!
//! let deployer = Deployer::new(client, keypair, config);
//! let address = deployer.signup(Salt::random(), public_key).await?;
//! # Ok(())
//! # }
//! ```

use crate::backend::SorobanBackend;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::signer::SignedTransaction;
use crate::transaction::UnsignedTransaction;
use crate::types::*;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stellar_xdr::curr::{
    AccountId, ContractDataDurability, Hash, LedgerEntryData, LedgerKey, LedgerKeyAccount,
    LedgerKeyContractData, Limits, PublicKey, ReadXdr, ScAddress, ScVal, Uint256, WriteXdr,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ═══════════════════════════════════════════════════════════════════
// JSON-RPC PLUMBING
// ═══════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLedgerEntriesResult {
    #[serde(default)]
    entries: Option<Vec<LedgerEntryInfo>>,
    #[serde(default)]
    latest_ledger: u32,
}

/// `getLatestLedger` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestLedger {
    pub id: String,
    pub protocol_version: u32,
    pub sequence: u32,
}

/// Soroban RPC + Horizon client.
pub struct SorobanClient {
    http: reqwest::Client,
    rpc_url: String,
    horizon_url: String,
    next_id: AtomicU64,
}

impl SorobanClient {
    /// Create a client for the endpoints in `config`, with the default timeout.
    pub fn new(config: &DeployConfig) -> Result<Self, DeployError> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    /// Create a client with a per-request timeout.
    pub fn with_timeout(config: &DeployConfig, timeout: Duration) -> Result<Self, DeployError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            horizon_url: config.horizon_url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn horizon_url(&self) -> &str {
        &self.horizon_url
    }

    /// Health check: latest ledger known to the RPC server.
    pub async fn get_latest_ledger(&self) -> Result<LatestLedger, DeployError> {
        self.call("getLatestLedger", serde_json::json!({})).await
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, DeployError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        tracing::debug!(method, id = request.id, "rpc call");

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?
            .error_for_status()
            .map_err(|e| transport_error(method, e))?;

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| DeployError::Network(format!("{}: malformed response: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(rpc_error(method, err));
        }

        body.result
            .ok_or_else(|| DeployError::Network(format!("{}: response has no result", method)))
    }

    /// `getLedgerEntries` for a single key. `None` if the entry does not exist.
    async fn get_ledger_entry(
        &self,
        key: &LedgerKey,
    ) -> Result<Option<LedgerEntryInfo>, DeployError> {
        let key_b64 = key.to_xdr_base64(Limits::none())?;
        let result: GetLedgerEntriesResult = self
            .call("getLedgerEntries", serde_json::json!({ "keys": [key_b64] }))
            .await?;

        tracing::trace!(latest_ledger = result.latest_ledger, "ledger entries fetched");
        Ok(result.entries.unwrap_or_default().into_iter().next())
    }
}

/// Map a JSON-RPC error object. Request-shape errors are final; the rest
/// (internal errors, server-defined codes) may clear up on retry.
fn rpc_error(method: &str, err: RpcError) -> DeployError {
    let detail = format!("{}: rpc error {}: {}", method, err.code, err.message);
    match err.code {
        -32700 => DeployError::Encoding(detail),
        -32602..=-32600 => DeployError::Validation(detail),
        _ => DeployError::Network(detail),
    }
}

fn transport_error(method: &str, err: reqwest::Error) -> DeployError {
    if err.is_timeout() {
        DeployError::Network(format!("{}: request timed out", method))
    } else {
        DeployError::Network(format!("{}: {}", method, err))
    }
}

// ═══════════════════════════════════════════════════════════════════
// SOROBAN BACKEND IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════

impl SorobanBackend for SorobanClient {
    async fn get_account(&self, account_id: &str) -> Result<AccountState, DeployError> {
        let pk = stellar_strkey::ed25519::PublicKey::from_string(account_id).map_err(|e| {
            DeployError::Validation(format!("invalid account id {:?}: {}", account_id, e))
        })?;
        let key = LedgerKey::Account(LedgerKeyAccount {
            account_id: AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(pk.0))),
        });

        let entry = self
            .get_ledger_entry(&key)
            .await?
            .ok_or_else(|| DeployError::NotFound(format!("account {} not found", account_id)))?;

        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Account(account) => Ok(AccountState {
                account_id: account_id.to_string(),
                sequence: account.seq_num.0,
            }),
            other => Err(DeployError::Encoding(format!(
                "expected account entry, got {}",
                other.name()
            ))),
        }
    }

    async fn get_contract_instance(
        &self,
        contract: &ContractAddress,
    ) -> Result<LedgerEntryInfo, DeployError> {
        let key = LedgerKey::ContractData(LedgerKeyContractData {
            contract: ScAddress::Contract(Hash(*contract.as_bytes())),
            key: ScVal::LedgerKeyContractInstance,
            durability: ContractDataDurability::Persistent,
        });

        self.get_ledger_entry(&key).await?.ok_or_else(|| {
            DeployError::NotFound(format!("contract instance {} not found", contract))
        })
    }

    async fn simulate_transaction(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<SimulateTransactionResponse, DeployError> {
        let envelope = tx.to_envelope_xdr_base64()?;
        self.call(
            "simulateTransaction",
            serde_json::json!({ "transaction": envelope }),
        )
        .await
    }

    async fn submit_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<SubmissionResult, DeployError> {
        let envelope = tx.to_xdr_base64()?;
        let url = format!("{}/transactions", self.horizon_url);
        tracing::debug!(hash = %tx.hash_hex(), "submitting transaction");

        let response = self
            .http
            .post(&url)
            .form(&[("tx", envelope.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("submit", e))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            DeployError::Network(format!("submit: malformed response (HTTP {}): {}", status, e))
        })?;

        // Only 2xx and 400 (transaction_failed / transaction_malformed) carry a
        // verdict on the transaction. Anything else (rate limits, gateway
        // errors, a wrong endpoint) never reached consensus and is retryable.
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            let title = body
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("unexpected response");
            return Err(DeployError::Network(format!(
                "submit: HTTP {}: {}",
                status, title
            )));
        }

        let result = SubmissionResult::from_response(body);
        if !result.successful {
            tracing::warn!(codes = %result.summary(), "transaction rejected");
        }
        Ok(result)
    }
}
