//! Error types for the Soroban deployment workflow.
//!
//! No `anyhow` leakage. Explicit, typed errors, each carrying the
//! diagnostics the caller needs to decide on retry or restore.

use crate::types::SubmissionResult;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeployError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network request failed: {0}")]
    Network(String),

    #[error("simulation failed: {error}")]
    Simulation { error: String, events: Vec<String> },

    #[error("archived ledger entries must be restored first (min resource fee {min_resource_fee})")]
    RestoreRequired {
        /// Base64 `SorobanTransactionData` for the restore footprint.
        transaction_data: String,
        min_resource_fee: i64,
    },

    #[error("submission rejected: {}", .0.summary())]
    SubmissionRejected(SubmissionResult),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid workflow state: {0}")]
    InvalidState(String),
}

/// Fieldless error category, for matching and for the failed step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Network,
    Simulation,
    RestoreRequired,
    SubmissionRejected,
    Signer,
    Encoding,
    InvalidState,
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Validation(_) => ErrorKind::Validation,
            DeployError::NotFound(_) => ErrorKind::NotFound,
            DeployError::Network(_) => ErrorKind::Network,
            DeployError::Simulation { .. } => ErrorKind::Simulation,
            DeployError::RestoreRequired { .. } => ErrorKind::RestoreRequired,
            DeployError::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            DeployError::Signer(_) => ErrorKind::Signer,
            DeployError::Encoding(_) => ErrorKind::Encoding,
            DeployError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Whether a later attempt might succeed without changing the inputs.
    ///
    /// `RestoreRequired` counts: once the archived entries are restored the
    /// same deployment goes through.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DeployError::Network(_) | DeployError::RestoreRequired { .. }
        )
    }
}

impl From<stellar_xdr::curr::Error> for DeployError {
    fn from(err: stellar_xdr::curr::Error) -> Self {
        DeployError::Encoding(err.to_string())
    }
}
