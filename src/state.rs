//! Deployment state machine definition.
//!
//! The state is the complete snapshot of one deployment attempt. The
//! intermediate transactions are kept as separate values, one per stage;
//! a later stage never overwrites an earlier one.

use crate::error::{DeployError, ErrorKind};
use crate::signer::SignedTransaction;
use crate::transaction::{SimulatedTransaction, UnsignedTransaction};
use crate::types::{AccountState, ContractAddress, DeploymentRequest, SubmissionResult};

/// Workflow steps, the state machine's nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Starting point.
    Start,
    /// Contract address computed; branch on the request kind.
    AddressDerived,
    /// Signin: probe the ledger for the contract instance.
    SigninCheck,
    /// Signup: fetch the payer account and build the deploy call.
    SignupBuild,
    /// Signup: simulation merged, ready to sign.
    SignupSimulated,
    /// Signup: signed, ready to submit.
    SignupSigned,
    /// Signup: submitted, result accepted.
    SignupSubmitted,
    /// Done.
    Done,
    /// Failed, with the originating error's category.
    Failed {
        kind: ErrorKind,
        reason: String,
        recoverable: bool,
    },
}

impl Step {
    /// Human-readable step name for logging/display.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::AddressDerived => "address_derived",
            Step::SigninCheck => "signin_check",
            Step::SignupBuild => "signup_build",
            Step::SignupSimulated => "signup_simulated",
            Step::SignupSigned => "signup_signed",
            Step::SignupSubmitted => "signup_submitted",
            Step::Done => "done",
            Step::Failed { .. } => "failed",
        }
    }
}

/// Full state of a single deployment attempt.
#[derive(Debug, Clone)]
pub struct DeploymentState {
    /// What the caller asked for.
    pub request: DeploymentRequest,
    /// Current step in the workflow.
    pub step: Step,

    // Populated as workflow progresses
    /// Deterministic contract address.
    pub address: Option<ContractAddress>,
    /// Payer account as fetched for this attempt.
    pub payer: Option<AccountState>,
    pub unsigned: Option<UnsignedTransaction>,
    pub simulated: Option<SimulatedTransaction>,
    pub signed: Option<SignedTransaction>,
    pub submission: Option<SubmissionResult>,

    /// Originating error once failed.
    pub error: Option<DeployError>,

    // Audit
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Unix timestamp of last update.
    pub updated_at: u64,
}

impl DeploymentState {
    pub fn new(request: DeploymentRequest) -> Self {
        let now = current_unix_time();

        Self {
            request,
            step: Step::Start,
            address: None,
            payer: None,
            unsigned: None,
            simulated: None,
            signed: None,
            submission: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Is this workflow in a terminal state?
    pub fn is_terminal(&self) -> bool {
        matches!(self.step, Step::Done | Step::Failed { .. })
    }

    /// Is this workflow failed?
    pub fn is_failed(&self) -> bool {
        matches!(self.step, Step::Failed { .. })
    }

    /// Is this workflow done?
    pub fn is_done(&self) -> bool {
        matches!(self.step, Step::Done)
    }

    /// Transition to a new step.
    pub fn transition(&mut self, step: Step) {
        self.step = step;
        self.updated_at = current_unix_time();
    }

    /// Fail the workflow, keeping the originating error.
    pub fn fail(&mut self, error: DeployError) {
        self.step = Step::Failed {
            kind: error.kind(),
            reason: error.to_string(),
            recoverable: error.is_recoverable(),
        };
        self.error = Some(error);
        self.updated_at = current_unix_time();
    }
}

fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
