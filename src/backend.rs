//! The One Trait: SorobanBackend
//!
//! This is the single abstraction point for everything that touches the
//! network. The workflow engine is pure logic: it doesn't know about
//! JSON-RPC, Horizon, or HTTP clients. That's YOUR problem when you
//! implement this trait (or use [`SorobanClient`](crate::SorobanClient)).

use crate::error::DeployError;
use crate::signer::SignedTransaction;
use crate::transaction::UnsignedTransaction;
use crate::types::*;
use std::future::Future;

/// The single trait consumers implement to use the deployment workflow.
///
/// Abstracts:
/// - Ledger queries (account state, contract instance probe)
/// - Transaction simulation
/// - Submission of signed envelopes
///
/// Implementations must keep "not found" and transport failures apart:
/// a timeout is [`DeployError::Network`], never [`DeployError::NotFound`].
pub trait SorobanBackend: Send + Sync {
    // ═══════════════════════════════════════════════════════════════
    // LEDGER QUERIES (read-only)
    // ═══════════════════════════════════════════════════════════════

    /// Fetch the current sequence number of an account.
    ///
    /// [`DeployError::NotFound`] if the account has never been funded.
    fn get_account(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<AccountState, DeployError>> + Send;

    /// Fetch the persistent instance entry of a contract.
    ///
    /// Used as an existence probe. [`DeployError::NotFound`] if the contract
    /// has not been deployed.
    fn get_contract_instance(
        &self,
        contract: &ContractAddress,
    ) -> impl Future<Output = Result<LedgerEntryInfo, DeployError>> + Send;

    // ═══════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════

    /// Dry-run a transaction. Returns the raw simulation; classifying it
    /// into success, failure or restore is the assembler's job.
    fn simulate_transaction(
        &self,
        tx: &UnsignedTransaction,
    ) -> impl Future<Output = Result<SimulateTransactionResponse, DeployError>> + Send;

    /// Post a signed envelope. An unsuccessful response is returned as
    /// `Ok(result)` with `successful == false`; only transport failures
    /// are errors.
    fn submit_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> impl Future<Output = Result<SubmissionResult, DeployError>> + Send;
}
