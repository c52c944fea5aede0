//! Deployment Workflow Engine
//!
//! The state machine that drives a deployment. It's dumb: it just
//! transitions between steps and calls the backend. No transport, no
//! retries. The first failure ends the attempt with its category intact.

use crate::backend::SorobanBackend;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::preimage::derive_address;
use crate::signer::{sign, SigningKeypair};
use crate::state::{DeploymentState, Step};
use crate::transaction::{assemble, build_deploy_transaction};
use crate::types::{ContractAddress, DeploymentRequest, Salt};
use tokio::sync::Mutex;

/// Result of advancing one step.
#[derive(Debug)]
pub enum StepResult {
    /// Keep going, call advance() again.
    Continue,
    /// Done successfully.
    Complete(ContractAddress),
    /// Already failed earlier; carries the originating error.
    Failed(DeployError),
}

/// The deployment workflow engine.
///
/// Parameterized by the backend; you provide the implementation.
/// Two workflows sharing a payer keypair must not run concurrently;
/// [`Deployer`] takes care of that.
pub struct DeploymentWorkflow<'a, B: SorobanBackend> {
    backend: &'a B,
    keypair: &'a SigningKeypair,
    config: &'a DeployConfig,
}

impl<'a, B: SorobanBackend> DeploymentWorkflow<'a, B> {
    /// Create a new workflow engine.
    pub fn new(backend: &'a B, keypair: &'a SigningKeypair, config: &'a DeployConfig) -> Self {
        Self {
            backend,
            keypair,
            config,
        }
    }

    /// Advance the workflow by one step.
    ///
    /// Each step does ONE thing, then transitions. A step error moves the
    /// state to `Failed` (keeping the error) and is returned as `Err`.
    pub async fn advance(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        tracing::debug!(step = state.step.name(), "advancing deployment");

        let step = state.step.clone();
        let result = match step {
            Step::Start => self.step_start(state),
            Step::AddressDerived => self.step_branch(state),
            Step::SigninCheck => self.step_signin_check(state).await,
            Step::SignupBuild => self.step_signup_build(state).await,
            Step::SignupSimulated => self.step_sign(state),
            Step::SignupSigned => self.step_submit(state).await,
            Step::SignupSubmitted => self.step_finish(state),
            Step::Done => {
                return state.address.map(StepResult::Complete).ok_or_else(|| {
                    DeployError::InvalidState("done without a contract address".into())
                })
            }
            Step::Failed { reason, .. } => {
                let error = state
                    .error
                    .clone()
                    .unwrap_or_else(|| DeployError::InvalidState(reason));
                return Ok(StepResult::Failed(error));
            }
        };

        if let Err(err) = &result {
            tracing::warn!(step = state.step.name(), error = %err, "deployment step failed");
            state.fail(err.clone());
        }

        result
    }

    /// Run until the deployment is done or has failed.
    pub async fn run_to_completion(
        &self,
        state: &mut DeploymentState,
    ) -> Result<ContractAddress, DeployError> {
        loop {
            match self.advance(state).await? {
                StepResult::Continue => continue,
                StepResult::Complete(address) => return Ok(address),
                StepResult::Failed(err) => return Err(err),
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // STEP IMPLEMENTATIONS
    // ═══════════════════════════════════════════════════════════════

    fn step_start(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        // Validate before anything goes over the wire
        state.request.validate()?;

        let address = derive_address(
            &self.config.network_passphrase,
            &self.config.factory_address,
            state.request.salt(),
        )?;
        tracing::info!(
            address = %address,
            signup = state.request.is_signup(),
            "derived contract address"
        );

        state.address = Some(address);
        state.transition(Step::AddressDerived);
        Ok(StepResult::Continue)
    }

    fn step_branch(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        let next = match state.request {
            DeploymentRequest::Signin { .. } => Step::SigninCheck,
            DeploymentRequest::Signup { .. } => Step::SignupBuild,
        };
        state.transition(next);
        Ok(StepResult::Continue)
    }

    async fn step_signin_check(
        &self,
        state: &mut DeploymentState,
    ) -> Result<StepResult, DeployError> {
        let address = require_address(state)?;

        self.backend
            .get_contract_instance(&address)
            .await
            .map_err(|err| match err {
                DeployError::NotFound(_) => {
                    DeployError::NotFound(format!("contract {} has not been deployed", address))
                }
                other => other,
            })?;

        state.transition(Step::Done);
        Ok(StepResult::Complete(address))
    }

    async fn step_signup_build(
        &self,
        state: &mut DeploymentState,
    ) -> Result<StepResult, DeployError> {
        if state.signed.is_some() {
            return Err(DeployError::InvalidState(
                "transaction already signed; start a new attempt".into(),
            ));
        }

        let DeploymentRequest::Signup { salt, public_key } = &state.request else {
            return Err(DeployError::InvalidState("signup step on a signin request".into()));
        };

        // Fresh account state for every attempt
        let payer = self.backend.get_account(&self.keypair.account_id()).await?;
        let unsigned = build_deploy_transaction(&payer, self.config, salt, public_key)?;
        tracing::debug!(
            payer = %payer.account_id,
            sequence = payer.sequence + 1,
            "built deploy transaction"
        );

        let sim = self.backend.simulate_transaction(&unsigned).await?;
        let assembled = assemble(&unsigned, &sim);
        state.payer = Some(payer);
        state.unsigned = Some(unsigned);

        let simulated = assembled?;
        tracing::debug!(
            fee = simulated.fee(),
            min_resource_fee = simulated.min_resource_fee(),
            latest_ledger = sim.latest_ledger,
            "simulation merged"
        );

        state.simulated = Some(simulated);
        state.transition(Step::SignupSimulated);
        Ok(StepResult::Continue)
    }

    fn step_sign(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        let simulated = state.simulated.as_ref().ok_or_else(|| {
            DeployError::InvalidState("simulated transaction missing at SignupSimulated".into())
        })?;

        let signed = sign(simulated, self.keypair, &self.config.network_passphrase)?;
        tracing::debug!(hash = %signed.hash_hex(), "signed deploy transaction");

        state.signed = Some(signed);
        state.transition(Step::SignupSigned);
        Ok(StepResult::Continue)
    }

    async fn step_submit(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        if state.submission.is_some() {
            return Err(DeployError::InvalidState("transaction already submitted".into()));
        }

        let signed = state.signed.as_ref().ok_or_else(|| {
            DeployError::InvalidState("signed transaction missing at SignupSigned".into())
        })?;

        let result = self.backend.submit_transaction(signed).await?;
        state.submission = Some(result.clone());

        if !result.successful {
            return Err(DeployError::SubmissionRejected(result));
        }

        tracing::info!(
            hash = result.hash.as_deref().unwrap_or_default(),
            ledger = result.ledger.unwrap_or_default(),
            "deploy transaction accepted"
        );
        state.transition(Step::SignupSubmitted);
        Ok(StepResult::Continue)
    }

    fn step_finish(&self, state: &mut DeploymentState) -> Result<StepResult, DeployError> {
        let address = require_address(state)?;
        state.transition(Step::Done);
        Ok(StepResult::Complete(address))
    }
}

fn require_address(state: &DeploymentState) -> Result<ContractAddress, DeployError> {
    state
        .address
        .ok_or_else(|| DeployError::InvalidState("contract address not derived".into()))
}

// ═══════════════════════════════════════════════════════════════════
// DEPLOYER
// ═══════════════════════════════════════════════════════════════════

/// High-level orchestrator: owns the backend, the payer keypair and the
/// configuration, and serializes signups so the payer's sequence number
/// is never raced.
pub struct Deployer<B: SorobanBackend> {
    backend: B,
    keypair: SigningKeypair,
    config: DeployConfig,
    sequence_lock: Mutex<()>,
}

impl<B: SorobanBackend> Deployer<B> {
    pub fn new(backend: B, keypair: SigningKeypair, config: DeployConfig) -> Self {
        Self {
            backend,
            keypair,
            config,
            sequence_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn keypair(&self) -> &SigningKeypair {
        &self.keypair
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Contract address for `salt`, without touching the network.
    pub fn derive_address(&self, salt: &Salt) -> Result<ContractAddress, DeployError> {
        derive_address(
            &self.config.network_passphrase,
            &self.config.factory_address,
            salt,
        )
    }

    /// Run one attempt and return its final state.
    ///
    /// Signups hold the sequence lock from account fetch to submission.
    pub async fn execute(&self, request: DeploymentRequest) -> DeploymentState {
        let mut state = DeploymentState::new(request);
        let workflow = DeploymentWorkflow::new(&self.backend, &self.keypair, &self.config);

        let _guard = if state.request.is_signup() {
            Some(self.sequence_lock.lock().await)
        } else {
            None
        };

        // The error is kept on the state
        let _ = workflow.run_to_completion(&mut state).await;
        state
    }

    /// Run one attempt and return the contract address.
    pub async fn deploy(&self, request: DeploymentRequest) -> Result<ContractAddress, DeployError> {
        let state = self.execute(request).await;
        match (state.step, state.address, state.error) {
            (Step::Done, Some(address), _) => Ok(address),
            (_, _, Some(err)) => Err(err),
            (step, _, None) => Err(DeployError::InvalidState(format!(
                "workflow stopped at {}",
                step.name()
            ))),
        }
    }

    /// Check that the contract for `salt` exists.
    pub async fn signin(&self, salt: Salt) -> Result<ContractAddress, DeployError> {
        self.deploy(DeploymentRequest::signin(salt)).await
    }

    /// Deploy the contract for `salt` with the identity's public key.
    pub async fn signup(
        &self,
        salt: Salt,
        public_key: impl Into<Vec<u8>>,
    ) -> Result<ContractAddress, DeployError> {
        self.deploy(DeploymentRequest::signup(salt, public_key)).await
    }
}
