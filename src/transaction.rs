//! Deploy transaction assembly.
//!
//! Three stages, each a distinct value:
//! [`UnsignedTransaction`] → [`SimulatedTransaction`] →
//! [`SignedTransaction`](crate::signer::SignedTransaction).
//! Nothing here talks to the network. The backend runs the simulation;
//! [`assemble`] folds its result into a new transaction.

use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::preimage::parse_sc_address;
use crate::types::{AccountState, Salt, SimulateTransactionResponse};
use stellar_xdr::curr::{
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo, MuxedAccount, Operation,
    OperationBody, Preconditions, ReadXdr, ScBytes, ScSymbol, ScVal, SequenceNumber,
    SorobanAuthorizationEntry, SorobanTransactionData, TimeBounds, TimePoint, Transaction,
    TransactionEnvelope, TransactionExt, TransactionV1Envelope, Uint256, VecM, WriteXdr,
};

/// Factory entry point invoked by every signup.
pub const DEPLOY_FUNCTION: &str = "deploy";

/// Deploy transaction before simulation: operation, placeholder fee, no expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    tx: Transaction,
}

impl UnsignedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Unsigned envelope, base64 XDR, as `simulateTransaction` expects it.
    pub fn to_envelope_xdr_base64(&self) -> Result<String, DeployError> {
        let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: self.tx.clone(),
            signatures: VecM::default(),
        });
        Ok(envelope.to_xdr_base64(Limits::none())?)
    }
}

/// Deploy transaction with simulated resources, fee and auth merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransaction {
    tx: Transaction,
    min_resource_fee: i64,
}

impl SimulatedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn min_resource_fee(&self) -> i64 {
        self.min_resource_fee
    }

    pub fn fee(&self) -> u32 {
        self.tx.fee
    }
}

/// Build the `deploy(salt, public_key)` invocation paid for by `payer`.
///
/// The sequence number is `payer.sequence + 1`, taken from the freshly
/// fetched account state. Fee is `config.base_fee`; time bounds are
/// `{0, 0}` (no expiry).
pub fn build_deploy_transaction(
    payer: &AccountState,
    config: &DeployConfig,
    salt: &Salt,
    public_key: &[u8],
) -> Result<UnsignedTransaction, DeployError> {
    if public_key.is_empty() {
        return Err(DeployError::Validation("public key must not be empty".into()));
    }

    let source = stellar_strkey::ed25519::PublicKey::from_string(&payer.account_id)
        .map_err(|e| {
            DeployError::Validation(format!("invalid payer account {:?}: {}", payer.account_id, e))
        })?;

    let seq_num = payer.sequence.checked_add(1).ok_or_else(|| {
        DeployError::Validation(format!("sequence number {} overflows", payer.sequence))
    })?;

    let args: VecM<ScVal> = vec![
        ScVal::Bytes(ScBytes(salt.as_bytes().to_vec().try_into()?)),
        ScVal::Bytes(ScBytes(public_key.to_vec().try_into()?)),
    ]
    .try_into()?;

    let invoke = InvokeContractArgs {
        contract_address: parse_sc_address(&config.factory_address)?,
        function_name: ScSymbol(DEPLOY_FUNCTION.try_into()?),
        args,
    };

    let operation = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function: HostFunction::InvokeContract(invoke),
            auth: VecM::default(),
        }),
    };

    let tx = Transaction {
        source_account: MuxedAccount::Ed25519(Uint256(source.0)),
        fee: config.base_fee,
        seq_num: SequenceNumber(seq_num),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(0),
        }),
        memo: Memo::None,
        operations: vec![operation].try_into()?,
        ext: TransactionExt::V0,
    };

    Ok(UnsignedTransaction { tx })
}

/// Merge a simulation result into the transaction.
///
/// - `error` set: the deploy would fail, [`DeployError::Simulation`].
/// - `restorePreamble` set: archived state needs restoring first,
///   [`DeployError::RestoreRequired`]. Never reported as a simulation failure.
/// - otherwise: fee becomes `base fee + minResourceFee`, the footprint goes
///   into `ext`, and the simulated auth entries fill the operation when it
///   carries none.
pub fn assemble(
    unsigned: &UnsignedTransaction,
    sim: &SimulateTransactionResponse,
) -> Result<SimulatedTransaction, DeployError> {
    if let Some(error) = &sim.error {
        return Err(DeployError::Simulation {
            error: error.clone(),
            events: sim.events.clone().unwrap_or_default(),
        });
    }

    if let Some(preamble) = &sim.restore_preamble {
        if !preamble.transaction_data.is_empty() {
            return Err(DeployError::RestoreRequired {
                transaction_data: preamble.transaction_data.clone(),
                min_resource_fee: parse_fee(&preamble.min_resource_fee)?,
            });
        }
    }

    let data_b64 = sim
        .transaction_data
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| DeployError::Encoding("simulation returned no transactionData".into()))?;
    let soroban_data = SorobanTransactionData::from_xdr_base64(data_b64, Limits::none())?;

    let min_resource_fee = parse_fee(sim.min_resource_fee.as_deref().unwrap_or("0"))?;
    let fee = u32::try_from(i64::from(unsigned.tx.fee) + min_resource_fee).map_err(|_| {
        DeployError::Validation(format!(
            "total fee {} + {} does not fit in u32",
            unsigned.tx.fee, min_resource_fee
        ))
    })?;

    let simulated_auth = sim
        .results
        .as_ref()
        .and_then(|r| r.first())
        .map(|r| {
            r.auth
                .iter()
                .map(|a| SorobanAuthorizationEntry::from_xdr_base64(a, Limits::none()))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let mut operations = unsigned.tx.operations.to_vec();
    for op in operations.iter_mut() {
        if let OperationBody::InvokeHostFunction(invoke) = &mut op.body {
            if invoke.auth.is_empty() && !simulated_auth.is_empty() {
                invoke.auth = simulated_auth.clone().try_into()?;
            }
        }
    }

    let tx = Transaction {
        fee,
        operations: operations.try_into()?,
        ext: TransactionExt::V1(soroban_data),
        ..unsigned.tx.clone()
    };

    Ok(SimulatedTransaction {
        tx,
        min_resource_fee,
    })
}

fn parse_fee(fee: &str) -> Result<i64, DeployError> {
    fee.trim()
        .parse::<i64>()
        .map_err(|e| DeployError::Encoding(format!("invalid resource fee {:?}: {}", fee, e)))
}
