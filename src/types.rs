//! Minimal domain types for the Soroban deployment workflow.
//!
//! These are the types the workflow engine needs. Nothing more.
//! XDR structures stay in `stellar_xdr`; what lives here is the
//! vocabulary the caller and the backend speak.

use crate::error::DeployError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-chosen 32-byte salt. Together with the network and the factory
/// it fully determines the deployed contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; 32]);

impl Salt {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DeployError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            DeployError::Validation(format!(
                "salt must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, DeployError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| DeployError::Validation(format!("salt is not valid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Fresh random salt for a new signup.
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(self.0))
    }
}

/// A Soroban contract address (`C...` strkey).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContractAddress([u8; 32]);

impl ContractAddress {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_strkey(&self) -> String {
        stellar_strkey::Contract(self.0).to_string()
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_strkey())
    }
}

impl fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractAddress({})", self.to_strkey())
    }
}

impl FromStr for ContractAddress {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        stellar_strkey::Contract::from_string(s.trim())
            .map(|c| Self(c.0))
            .map_err(|e| {
                DeployError::Validation(format!("invalid contract address {:?}: {}", s, e))
            })
    }
}

impl Serialize for ContractAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_strkey())
    }
}

impl<'de> Deserialize<'de> for ContractAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What the caller wants: resume an existing identity or register a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentRequest {
    /// Only check that the derived contract already exists.
    Signin { salt: Salt },
    /// Deploy through the factory with the identity's public key.
    Signup { salt: Salt, public_key: Vec<u8> },
}

impl DeploymentRequest {
    pub fn signin(salt: Salt) -> Self {
        DeploymentRequest::Signin { salt }
    }

    pub fn signup(salt: Salt, public_key: impl Into<Vec<u8>>) -> Self {
        DeploymentRequest::Signup {
            salt,
            public_key: public_key.into(),
        }
    }

    pub fn salt(&self) -> &Salt {
        match self {
            DeploymentRequest::Signin { salt } | DeploymentRequest::Signup { salt, .. } => salt,
        }
    }

    pub fn is_signup(&self) -> bool {
        matches!(self, DeploymentRequest::Signup { .. })
    }

    /// Reject requests that could never produce a valid invocation.
    pub fn validate(&self) -> Result<(), DeployError> {
        if let DeploymentRequest::Signup { public_key, .. } = self {
            if public_key.is_empty() {
                return Err(DeployError::Validation("public key must not be empty".into()));
            }
        }
        Ok(())
    }
}

/// Account state fetched right before building a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// `G...` strkey.
    pub account_id: String,
    /// Current on-ledger sequence number. The next transaction uses `sequence + 1`.
    pub sequence: i64,
}

/// Raw ledger entry returned by `getLedgerEntries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryInfo {
    #[serde(rename = "key")]
    pub key_xdr: String,
    pub xdr: String,
    #[serde(rename = "lastModifiedLedgerSeq")]
    pub last_modified_ledger: u32,
    #[serde(rename = "liveUntilLedgerSeq", default)]
    pub live_until_ledger: Option<u32>,
}

/// `simulateTransaction` result, as the RPC returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<SimulateHostFunctionResult>>,
    #[serde(default)]
    pub restore_preamble: Option<RestorePreamble>,
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub latest_ledger: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulateHostFunctionResult {
    #[serde(default)]
    pub auth: Vec<String>,
    #[serde(default)]
    pub xdr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePreamble {
    pub transaction_data: String,
    pub min_resource_fee: String,
}

/// Outcome of posting a signed envelope to the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub successful: bool,
    pub hash: Option<String>,
    pub ledger: Option<u64>,
    /// Transaction and operation result codes, when the endpoint reports them.
    pub result_codes: Vec<String>,
    /// Full response body.
    pub raw: serde_json::Value,
}

impl SubmissionResult {
    /// Interpret a Horizon `POST /transactions` response body.
    ///
    /// Problem documents carry no `successful` flag and count as failures.
    pub fn from_response(raw: serde_json::Value) -> Self {
        let successful = raw
            .get("successful")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let hash = raw
            .get("hash")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let ledger = raw.get("ledger").and_then(|v| v.as_u64());

        let mut result_codes = Vec::new();
        if let Some(codes) = raw.pointer("/extras/result_codes") {
            if let Some(tx) = codes.get("transaction").and_then(|v| v.as_str()) {
                result_codes.push(tx.to_string());
            }
            if let Some(ops) = codes.get("operations").and_then(|v| v.as_array()) {
                result_codes.extend(ops.iter().filter_map(|v| v.as_str()).map(str::to_string));
            }
        }

        Self {
            successful,
            hash,
            ledger,
            result_codes,
            raw,
        }
    }

    pub fn summary(&self) -> String {
        if !self.result_codes.is_empty() {
            return self.result_codes.join(", ");
        }
        self.raw
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("no result codes")
            .to_string()
    }
}
