//! Workflow tests against an in-memory ledger.
//!
//! The mock behaves like a tiny network: it tracks account sequence
//! numbers and deployed contracts, rejects stale sequence numbers and
//! fails simulation for salts that are already deployed.

use soroban_deploy_rs::config::TESTNET_PASSPHRASE;
use soroban_deploy_rs::{
    derive_address, AccountState, ContractAddress, DeployConfig, DeployError, Deployer,
    DeploymentRequest, DeploymentState, DeploymentWorkflow, ErrorKind, LedgerEntryInfo,
    RestorePreamble, Salt, SignedTransaction, SigningKeypair, SimulateHostFunctionResult,
    SimulateTransactionResponse, SorobanBackend, Step, StepResult, SubmissionResult,
    UnsignedTransaction,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use stellar_xdr::curr::{
    ExtensionPoint, HostFunction, LedgerFootprint, Limits, OperationBody, ScVal,
    SorobanResources, SorobanTransactionData, TransactionEnvelope, VecM, WriteXdr,
};

const FACTORY: &str = "CAIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRCEIRDB3V";

fn config() -> DeployConfig {
    DeployConfig::new(TESTNET_PASSPHRASE, FACTORY, "http://rpc", "http://horizon").unwrap()
}

fn payer() -> SigningKeypair {
    SigningKeypair::from_seed([7u8; 32])
}

fn soroban_data_b64() -> String {
    SorobanTransactionData {
        ext: ExtensionPoint::V0,
        resources: SorobanResources {
            footprint: LedgerFootprint {
                read_only: VecM::default(),
                read_write: VecM::default(),
            },
            instructions: 2_000_000,
            read_bytes: 4096,
            write_bytes: 2048,
        },
        resource_fee: 60_000,
    }
    .to_xdr_base64(Limits::none())
    .unwrap()
}

#[derive(Default)]
struct Calls {
    get_account: AtomicUsize,
    get_contract_instance: AtomicUsize,
    simulate: AtomicUsize,
    submit: AtomicUsize,
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<String, i64>,
    contracts: HashSet<ContractAddress>,
}

/// Failure to inject at a given backend call.
#[derive(Clone)]
enum Fault {
    None,
    NetworkOnGetAccount,
    NetworkOnProbe,
    RestoreOnSimulate,
    RejectSubmission,
}

struct MockBackend {
    config: DeployConfig,
    ledger: Mutex<Ledger>,
    calls: Calls,
    fault: Fault,
}

impl MockBackend {
    fn new() -> Self {
        let mut ledger = Ledger::default();
        ledger.accounts.insert(payer().account_id(), 100);
        Self {
            config: config(),
            ledger: Mutex::new(ledger),
            calls: Calls::default(),
            fault: Fault::None,
        }
    }

    fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    fn without_payer(self) -> Self {
        self.ledger.lock().unwrap().accounts.clear();
        self
    }

    fn with_deployed(self, salt: &Salt) -> Self {
        let address = self.address_for(salt);
        self.ledger.lock().unwrap().contracts.insert(address);
        self
    }

    fn address_for(&self, salt: &Salt) -> ContractAddress {
        derive_address(
            &self.config.network_passphrase,
            &self.config.factory_address,
            salt,
        )
        .unwrap()
    }

    fn deployed_count(&self) -> usize {
        self.ledger.lock().unwrap().contracts.len()
    }

    fn sequence_of(&self, account_id: &str) -> Option<i64> {
        self.ledger.lock().unwrap().accounts.get(account_id).copied()
    }

    fn network_calls(&self) -> usize {
        self.calls.get_account.load(Ordering::SeqCst)
            + self.calls.get_contract_instance.load(Ordering::SeqCst)
            + self.calls.simulate.load(Ordering::SeqCst)
            + self.calls.submit.load(Ordering::SeqCst)
    }
}

fn salt_argument(tx: &stellar_xdr::curr::Transaction) -> Salt {
    let OperationBody::InvokeHostFunction(op) = &tx.operations[0].body else {
        panic!("expected invoke host function");
    };
    let HostFunction::InvokeContract(args) = &op.host_function else {
        panic!("expected contract invocation");
    };
    let ScVal::Bytes(bytes) = &args.args[0] else {
        panic!("expected salt bytes");
    };
    Salt::from_slice(&bytes.0.to_vec()).unwrap()
}

impl SorobanBackend for MockBackend {
    async fn get_account(&self, account_id: &str) -> Result<AccountState, DeployError> {
        self.calls.get_account.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if matches!(self.fault, Fault::NetworkOnGetAccount) {
            return Err(DeployError::Network("connection reset".into()));
        }

        let sequence = self
            .sequence_of(account_id)
            .ok_or_else(|| DeployError::NotFound(format!("account {} not found", account_id)))?;
        Ok(AccountState {
            account_id: account_id.to_string(),
            sequence,
        })
    }

    async fn get_contract_instance(
        &self,
        contract: &ContractAddress,
    ) -> Result<LedgerEntryInfo, DeployError> {
        self.calls.get_contract_instance.fetch_add(1, Ordering::SeqCst);

        if matches!(self.fault, Fault::NetworkOnProbe) {
            return Err(DeployError::Network("request timed out".into()));
        }

        if self.ledger.lock().unwrap().contracts.contains(contract) {
            Ok(LedgerEntryInfo {
                key_xdr: "AAAA".into(),
                xdr: "AAAA".into(),
                last_modified_ledger: 1,
                live_until_ledger: Some(100_000),
            })
        } else {
            Err(DeployError::NotFound(format!("contract instance {} not found", contract)))
        }
    }

    async fn simulate_transaction(
        &self,
        tx: &UnsignedTransaction,
    ) -> Result<SimulateTransactionResponse, DeployError> {
        self.calls.simulate.fetch_add(1, Ordering::SeqCst);

        if matches!(self.fault, Fault::RestoreOnSimulate) {
            return Ok(SimulateTransactionResponse {
                transaction_data: Some(soroban_data_b64()),
                min_resource_fee: Some("60000".into()),
                results: Some(vec![SimulateHostFunctionResult::default()]),
                restore_preamble: Some(RestorePreamble {
                    transaction_data: soroban_data_b64(),
                    min_resource_fee: "1500".into(),
                }),
                latest_ledger: 10,
                ..Default::default()
            });
        }

        let address = self.address_for(&salt_argument(tx.transaction()));
        if self.ledger.lock().unwrap().contracts.contains(&address) {
            return Ok(SimulateTransactionResponse {
                error: Some("HostError: Error(Storage, ExistingValue)".into()),
                events: Some(vec!["AAAAAQ==".into()]),
                latest_ledger: 10,
                ..Default::default()
            });
        }

        Ok(SimulateTransactionResponse {
            transaction_data: Some(soroban_data_b64()),
            min_resource_fee: Some("60000".into()),
            results: Some(vec![SimulateHostFunctionResult::default()]),
            latest_ledger: 10,
            ..Default::default()
        })
    }

    async fn submit_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<SubmissionResult, DeployError> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if matches!(self.fault, Fault::RejectSubmission) {
            return Ok(SubmissionResult::from_response(serde_json::json!({
                "title": "Transaction Failed",
                "status": 400,
                "extras": { "result_codes": { "transaction": "tx_insufficient_fee" } }
            })));
        }

        let TransactionEnvelope::Tx(envelope) = tx.envelope() else {
            panic!("expected v1 envelope");
        };
        assert_eq!(envelope.signatures.len(), 1);

        let payer_id = payer().account_id();
        let mut ledger = self.ledger.lock().unwrap();
        let current = ledger.accounts[&payer_id];
        if envelope.tx.seq_num.0 != current + 1 {
            return Ok(SubmissionResult::from_response(serde_json::json!({
                "title": "Transaction Failed",
                "status": 400,
                "extras": { "result_codes": { "transaction": "tx_bad_seq" } }
            })));
        }

        ledger.accounts.insert(payer_id, current + 1);
        let address = derive_address(
            &self.config.network_passphrase,
            &self.config.factory_address,
            &salt_argument(&envelope.tx),
        )
        .unwrap();
        ledger.contracts.insert(address);

        Ok(SubmissionResult::from_response(serde_json::json!({
            "successful": true,
            "hash": tx.hash_hex(),
            "ledger": 11,
        })))
    }
}

// ═══════════════════════════════════════════════════════════════════
// SIGNIN
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_signin_missing_contract_fails_not_found() {
    let deployer = Deployer::new(MockBackend::new(), payer(), config());

    let state = deployer
        .execute(DeploymentRequest::signin(Salt::new([0u8; 32])))
        .await;

    assert!(matches!(
        state.step,
        Step::Failed {
            kind: ErrorKind::NotFound,
            recoverable: false,
            ..
        }
    ));
    assert!(matches!(state.error, Some(DeployError::NotFound(_))));
    assert_eq!(
        state.address.unwrap().to_string(),
        "CCBFVQF6YV6RJCWGVGSNDY4PQABLOTE2ZEQ6KOALVISA7BFGQW736OVX"
    );

    let calls = &deployer.backend().calls;
    assert_eq!(calls.get_contract_instance.load(Ordering::SeqCst), 1);
    assert_eq!(calls.get_account.load(Ordering::SeqCst), 0);
    assert_eq!(calls.simulate.load(Ordering::SeqCst), 0);
    assert_eq!(calls.submit.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signin_existing_contract() {
    let salt = Salt::new([5u8; 32]);
    let deployer = Deployer::new(MockBackend::new().with_deployed(&salt), payer(), config());

    let address = deployer.signin(salt).await.unwrap();
    assert_eq!(address, deployer.derive_address(&salt).unwrap());
    assert_eq!(deployer.backend().calls.submit.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signin_network_error_is_not_not_found() {
    let deployer = Deployer::new(
        MockBackend::new().with_fault(Fault::NetworkOnProbe),
        payer(),
        config(),
    );

    let err = deployer.signin(Salt::new([0u8; 32])).await.unwrap_err();
    assert!(matches!(err, DeployError::Network(_)));
    assert!(err.is_recoverable());
}

// ═══════════════════════════════════════════════════════════════════
// SIGNUP
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_signup_fresh_salt_deploys() {
    let salt = Salt::new([1u8; 32]);
    let deployer = Deployer::new(MockBackend::new(), payer(), config());

    let state = deployer
        .execute(DeploymentRequest::signup(salt, [9u8; 32]))
        .await;

    assert!(state.is_done(), "unexpected state {:?}", state.step);
    let address = state.address.unwrap();
    assert_eq!(
        address,
        derive_address(TESTNET_PASSPHRASE, FACTORY, &salt).unwrap()
    );
    assert_eq!(
        address.to_string(),
        "CBUVYLXKIBVYVUVRDQJIG5LGVAFENDQ2PN7POZIGVZCZXPT6MBOU3JBX"
    );

    // every stage kept as its own value
    let unsigned = state.unsigned.as_ref().unwrap();
    let simulated = state.simulated.as_ref().unwrap();
    assert_eq!(unsigned.transaction().fee, 100);
    assert_eq!(simulated.fee(), 100 + 60_000);
    assert_eq!(unsigned.transaction().seq_num.0, 101);
    assert!(state.signed.is_some());
    assert!(state.submission.as_ref().unwrap().successful);

    assert_eq!(deployer.backend().deployed_count(), 1);
    assert_eq!(deployer.backend().sequence_of(&payer().account_id()), Some(101));

    // and the identity can now sign in
    assert_eq!(deployer.signin(salt).await.unwrap(), address);
}

#[tokio::test]
async fn test_signup_already_deployed_fails_in_simulation() {
    let salt = Salt::new([2u8; 32]);
    let deployer = Deployer::new(MockBackend::new().with_deployed(&salt), payer(), config());

    let state = deployer
        .execute(DeploymentRequest::signup(salt, [9u8; 32]))
        .await;

    match state.error.as_ref().unwrap() {
        DeployError::Simulation { error, events } => {
            assert!(error.contains("ExistingValue"));
            assert_eq!(events.len(), 1);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(state.unsigned.is_some());
    assert!(state.simulated.is_none());
    assert!(state.signed.is_none());
    assert_eq!(deployer.backend().calls.submit.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signup_restore_required_is_distinct() {
    let deployer = Deployer::new(
        MockBackend::new().with_fault(Fault::RestoreOnSimulate),
        payer(),
        config(),
    );

    let err = deployer
        .signup(Salt::new([3u8; 32]), [9u8; 32])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RestoreRequired);
    assert!(err.is_recoverable());
    match err {
        DeployError::RestoreRequired {
            transaction_data,
            min_resource_fee,
        } => {
            assert_eq!(min_resource_fee, 1500);
            assert!(!transaction_data.is_empty());
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(deployer.backend().calls.submit.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signup_submission_rejected_keeps_response() {
    let deployer = Deployer::new(
        MockBackend::new().with_fault(Fault::RejectSubmission),
        payer(),
        config(),
    );

    let err = deployer
        .signup(Salt::new([4u8; 32]), [9u8; 32])
        .await
        .unwrap_err();

    match err {
        DeployError::SubmissionRejected(result) => {
            assert!(!result.successful);
            assert_eq!(result.result_codes, vec!["tx_insufficient_fee"]);
            assert_eq!(result.raw["status"], 400);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(deployer.backend().deployed_count(), 0);
}

#[tokio::test]
async fn test_signup_unfunded_payer() {
    let deployer = Deployer::new(MockBackend::new().without_payer(), payer(), config());

    let err = deployer
        .signup(Salt::new([1u8; 32]), [9u8; 32])
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::NotFound(_)));
    assert_eq!(deployer.backend().calls.simulate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signup_network_error_propagates() {
    let deployer = Deployer::new(
        MockBackend::new().with_fault(Fault::NetworkOnGetAccount),
        payer(),
        config(),
    );

    let err = deployer
        .signup(Salt::new([1u8; 32]), [9u8; 32])
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Network(_)));
    assert_eq!(deployer.backend().calls.simulate.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_public_key_fails_before_network() {
    let deployer = Deployer::new(MockBackend::new(), payer(), config());

    let state = deployer
        .execute(DeploymentRequest::signup(Salt::new([1u8; 32]), Vec::new()))
        .await;

    assert!(matches!(state.error, Some(DeployError::Validation(_))));
    assert!(state.address.is_none());
    assert_eq!(deployer.backend().network_calls(), 0);
}

#[tokio::test]
async fn test_resubmitting_signed_transaction_does_not_deploy_twice() {
    let deployer = Deployer::new(MockBackend::new(), payer(), config());

    let state = deployer
        .execute(DeploymentRequest::signup(Salt::new([1u8; 32]), [9u8; 32]))
        .await;
    assert!(state.is_done());

    let signed = state.signed.unwrap();
    let again = deployer.backend().submit_transaction(&signed).await.unwrap();
    assert!(!again.successful);
    assert_eq!(again.result_codes, vec!["tx_bad_seq"]);
    assert_eq!(deployer.backend().deployed_count(), 1);
}

#[tokio::test]
async fn test_concurrent_signups_are_serialized() {
    let deployer = Deployer::new(MockBackend::new(), payer(), config());

    let (a, b) = tokio::join!(
        deployer.signup(Salt::new([0x0A; 32]), [9u8; 32]),
        deployer.signup(Salt::new([0x0B; 32]), [9u8; 32]),
    );

    assert!(a.is_ok(), "{:?}", a);
    assert!(b.is_ok(), "{:?}", b);
    assert_ne!(a.unwrap(), b.unwrap());
    assert_eq!(deployer.backend().deployed_count(), 2);
    assert_eq!(deployer.backend().sequence_of(&payer().account_id()), Some(102));
}

// ═══════════════════════════════════════════════════════════════════
// STEP ENGINE
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_signup_step_sequence() {
    let backend = MockBackend::new();
    let keypair = payer();
    let config = config();
    let workflow = DeploymentWorkflow::new(&backend, &keypair, &config);
    let request = DeploymentRequest::signup(Salt::new([6u8; 32]), [9u8; 32]);
    let mut state = DeploymentState::new(request);

    let mut steps = vec![state.step.name()];
    loop {
        match workflow.advance(&mut state).await.unwrap() {
            StepResult::Continue => steps.push(state.step.name()),
            StepResult::Complete(_) => break,
            StepResult::Failed(err) => panic!("failed: {}", err),
        }
    }
    steps.push(state.step.name());

    assert_eq!(
        steps,
        vec![
            "start",
            "address_derived",
            "signup_build",
            "signup_simulated",
            "signup_signed",
            "signup_submitted",
            "done",
        ]
    );
}

#[tokio::test]
async fn test_terminal_states_are_stable() {
    let backend = MockBackend::new();
    let keypair = payer();
    let config = config();
    let workflow = DeploymentWorkflow::new(&backend, &keypair, &config);

    let mut failed = DeploymentState::new(DeploymentRequest::signin(Salt::new([0u8; 32])));
    assert!(workflow.run_to_completion(&mut failed).await.is_err());
    let probes = backend.calls.get_contract_instance.load(Ordering::SeqCst);
    match workflow.advance(&mut failed).await.unwrap() {
        StepResult::Failed(DeployError::NotFound(_)) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(backend.calls.get_contract_instance.load(Ordering::SeqCst), probes);

    let request = DeploymentRequest::signup(Salt::new([8u8; 32]), [9u8; 32]);
    let mut done = DeploymentState::new(request);
    let address = workflow.run_to_completion(&mut done).await.unwrap();
    match workflow.advance(&mut done).await.unwrap() {
        StepResult::Complete(again) => assert_eq!(again, address),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(backend.calls.submit.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_signed_state_is_never_rebuilt() {
    let backend = MockBackend::new().with_fault(Fault::RejectSubmission);
    let keypair = payer();
    let config = config();
    let workflow = DeploymentWorkflow::new(&backend, &keypair, &config);

    let request = DeploymentRequest::signup(Salt::new([1u8; 32]), [9u8; 32]);
    let mut state = DeploymentState::new(request);
    assert!(workflow.run_to_completion(&mut state).await.is_err());
    assert!(state.signed.is_some());

    // forcing the state back to build must not produce a second transaction
    state.transition(Step::SignupBuild);
    let err = workflow.advance(&mut state).await.unwrap_err();
    assert!(matches!(err, DeployError::InvalidState(_)));
    assert_eq!(backend.calls.get_account.load(Ordering::SeqCst), 1);
}
