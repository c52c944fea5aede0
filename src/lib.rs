//! Soroban Deploy Library
//!
//! Standalone, trait-based workflow engine for deterministic contract
//! deployments through a Soroban factory contract.
//!
//! # Design
//!
//! The contract address is a pure function of the network passphrase, the
//! factory address and a caller-chosen salt. A *signin* only checks that
//! the contract at that address exists; a *signup* builds, simulates,
//! signs and submits a call to the factory's `deploy(salt, public_key)`.
//!
//! The workflow logic is not coupled to any transport. You implement the
//! [`SorobanBackend`] trait (or use the bundled [`SorobanClient`]), and the
//! workflow engine handles the state machine.
//!
//! # Usage
//!
//! ```ignore
//! use soroban_deploy_rs::{DeployConfig, Deployer, Salt, SigningKeypair, SorobanClient};
//!
//! let config = DeployConfig::from_env()?;
//! let client = SorobanClient::new(&config)?;
//! let deployer = Deployer::new(client, SigningKeypair::from_secret(&secret)?, config);
//!
//! // Register a new identity
//! let salt = Salt::random();
//! let address = deployer.signup(salt, passkey_public_key).await?;
//!
//! // Later: resume it
//! assert_eq!(deployer.signin(salt).await?, address);
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod preimage;
pub mod signer;
pub mod state;
pub mod transaction;
pub mod types;
pub mod workflow;

#[cfg(feature = "default-client")]
pub mod client;

// Re-export the main types at crate root for convenience
pub use backend::SorobanBackend;
pub use config::DeployConfig;
pub use error::{DeployError, ErrorKind};
pub use preimage::derive_address;
pub use signer::{sign, SignedTransaction, SigningKeypair};
pub use state::{DeploymentState, Step};
pub use transaction::{
    assemble, build_deploy_transaction, SimulatedTransaction, UnsignedTransaction,
};
pub use types::*;
pub use workflow::{Deployer, DeploymentWorkflow, StepResult};

#[cfg(feature = "default-client")]
pub use client::SorobanClient;
