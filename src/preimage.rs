//! Deterministic contract address derivation.
//!
//! The address of a factory-deployed contract is
//! `sha256(xdr(HashIdPreimage::ContractId { network_id, from_address(factory, salt) }))`.
//! Pure functions, no I/O. Same network, factory and salt give the same
//! address whether or not the contract has been deployed yet.

use crate::error::DeployError;
use crate::types::{ContractAddress, Salt};
use sha2::{Digest, Sha256};
use stellar_strkey::Strkey;
use stellar_xdr::curr::{
    AccountId, ContractIdPreimage, ContractIdPreimageFromAddress, Hash, HashIdPreimage,
    HashIdPreimageContractId, Limits, PublicKey, ScAddress, Uint256, WriteXdr,
};

/// `sha256(passphrase)`, the 32-byte network id.
pub fn network_id(network_passphrase: &str) -> [u8; 32] {
    Sha256::digest(network_passphrase.as_bytes()).into()
}

/// Parse a `C...` contract or `G...` account strkey into an `ScAddress`.
pub fn parse_sc_address(address: &str) -> Result<ScAddress, DeployError> {
    let strkey = Strkey::from_string(address.trim()).map_err(|e| {
        DeployError::Validation(format!("invalid address {:?}: {}", address, e))
    })?;

    match strkey {
        Strkey::Contract(c) => Ok(ScAddress::Contract(Hash(c.0))),
        Strkey::PublicKeyEd25519(pk) => Ok(ScAddress::Account(AccountId(
            PublicKey::PublicKeyTypeEd25519(Uint256(pk.0)),
        ))),
        _ => Err(DeployError::Validation(format!(
            "{:?} is neither a contract nor an account address",
            address
        ))),
    }
}

/// Build the preimage record for a factory deployment.
pub fn contract_id_preimage(
    network_id: [u8; 32],
    factory: ScAddress,
    salt: &Salt,
) -> HashIdPreimage {
    HashIdPreimage::ContractId(HashIdPreimageContractId {
        network_id: Hash(network_id),
        contract_id_preimage: ContractIdPreimage::Address(ContractIdPreimageFromAddress {
            address: factory,
            salt: Uint256(*salt.as_bytes()),
        }),
    })
}

/// Hash a preimage into a contract id.
pub fn derive_contract_id(preimage: &HashIdPreimage) -> Result<ContractAddress, DeployError> {
    let bytes = preimage.to_xdr(Limits::none())?;
    Ok(ContractAddress::from_bytes(Sha256::digest(&bytes).into()))
}

/// Derive the address the factory will deploy to for this salt.
///
/// Fails only on a malformed factory address.
pub fn derive_address(
    network_passphrase: &str,
    factory_address: &str,
    salt: &Salt,
) -> Result<ContractAddress, DeployError> {
    let factory = parse_sc_address(factory_address)?;
    let preimage = contract_id_preimage(network_id(network_passphrase), factory, salt);
    derive_contract_id(&preimage)
}
