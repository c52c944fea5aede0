//! Network and factory configuration.
//!
//! Built once, never mutated. Everything that used to be an ambient
//! environment global is a field here.

use crate::error::DeployError;
use crate::preimage::parse_sc_address;

pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";
pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

/// Placeholder inclusion fee (stroops) for the unsigned transaction.
/// Simulation adds the resource fee on top.
pub const BASE_FEE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Network passphrase; hashed into every preimage and signature payload.
    pub network_passphrase: String,
    /// Factory strkey (`C...`, or `G...` for an account-addressed deployer).
    pub factory_address: String,
    /// Soroban RPC endpoint (JSON-RPC).
    pub rpc_url: String,
    /// Horizon endpoint used for submission.
    pub horizon_url: String,
    /// Inclusion fee for the deploy transaction, in stroops.
    pub base_fee: u32,
}

impl DeployConfig {
    /// Create a validated configuration.
    pub fn new(
        network_passphrase: impl Into<String>,
        factory_address: impl Into<String>,
        rpc_url: impl Into<String>,
        horizon_url: impl Into<String>,
    ) -> Result<Self, DeployError> {
        let config = Self {
            network_passphrase: network_passphrase.into(),
            factory_address: factory_address.into().trim().to_string(),
            rpc_url: rpc_url.into(),
            horizon_url: horizon_url.into(),
            base_fee: BASE_FEE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Public testnet endpoints with the given factory.
    pub fn testnet(factory_address: impl Into<String>) -> Result<Self, DeployError> {
        Self::new(
            TESTNET_PASSPHRASE,
            factory_address,
            TESTNET_RPC_URL,
            TESTNET_HORIZON_URL,
        )
    }

    /// Read `NETWORK_PASSPHRASE`, `FACTORY_CONTRACT_ID`, `RPC_URL` and
    /// `HORIZON_URL`. Passphrase and endpoints fall back to testnet.
    pub fn from_env() -> Result<Self, DeployError> {
        let factory = std::env::var("FACTORY_CONTRACT_ID")
            .map_err(|_| DeployError::Validation("FACTORY_CONTRACT_ID not set".into()))?;
        let var_or = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        Self::new(
            var_or("NETWORK_PASSPHRASE", TESTNET_PASSPHRASE),
            factory,
            var_or("RPC_URL", TESTNET_RPC_URL),
            var_or("HORIZON_URL", TESTNET_HORIZON_URL),
        )
    }

    pub fn with_base_fee(mut self, base_fee: u32) -> Self {
        self.base_fee = base_fee;
        self
    }

    fn validate(&self) -> Result<(), DeployError> {
        if self.network_passphrase.is_empty() {
            return Err(DeployError::Validation("network passphrase is empty".into()));
        }
        parse_sc_address(&self.factory_address)?;
        if self.rpc_url.trim().is_empty() {
            return Err(DeployError::Validation("rpc url is empty".into()));
        }
        if self.horizon_url.trim().is_empty() {
            return Err(DeployError::Validation("horizon url is empty".into()));
        }
        Ok(())
    }
}
