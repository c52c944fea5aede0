//! Transaction signing.
//!
//! The signature covers `sha256(xdr(TransactionSignaturePayload))`, which
//! embeds the network id. The same transaction body signed for two
//! networks yields two different signatures.

use crate::error::DeployError;
use crate::preimage::network_id;
use crate::transaction::SimulatedTransaction;
use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};
use std::fmt;
use stellar_xdr::curr::{
    DecoratedSignature, Hash, Limits, MuxedAccount, SignatureHint, Transaction,
    TransactionEnvelope, TransactionSignaturePayload, TransactionSignaturePayloadTaggedTransaction,
    TransactionV1Envelope, WriteXdr,
};

/// Ed25519 keypair of the account that pays for deployments.
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// From a `S...` secret seed strkey.
    pub fn from_secret(secret: &str) -> Result<Self, DeployError> {
        let seed = stellar_strkey::ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|e| DeployError::Signer(format!("invalid secret seed: {}", e)))?;
        Ok(Self::from_seed(seed.0))
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// `G...` account id.
    pub fn account_id(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.public_key()).to_string()
    }

    /// Last four bytes of the public key.
    pub fn hint(&self) -> SignatureHint {
        let pk = self.public_key();
        SignatureHint([pk[28], pk[29], pk[30], pk[31]])
    }

    fn decorated_signature(
        &self,
        payload_hash: &[u8; 32],
    ) -> Result<DecoratedSignature, DeployError> {
        let signature = self.signing_key.sign(payload_hash);
        Ok(DecoratedSignature {
            hint: self.hint(),
            signature: stellar_xdr::curr::Signature(signature.to_bytes().to_vec().try_into()?),
        })
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("account_id", &self.account_id())
            .finish_non_exhaustive()
    }
}

/// Signed envelope, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    envelope: TransactionEnvelope,
    hash: [u8; 32],
}

impl SignedTransaction {
    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// Transaction hash (the signed payload hash).
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn signatures(&self) -> &[DecoratedSignature] {
        match &self.envelope {
            TransactionEnvelope::Tx(v1) => &v1.signatures,
            TransactionEnvelope::TxV0(v0) => &v0.signatures,
            TransactionEnvelope::TxFeeBump(fb) => &fb.signatures,
        }
    }

    /// Canonical wire encoding, base64 XDR.
    pub fn to_xdr_base64(&self) -> Result<String, DeployError> {
        Ok(self.envelope.to_xdr_base64(Limits::none())?)
    }
}

/// Hash of the signature payload for `tx` on the given network.
pub fn signature_payload_hash(
    tx: &Transaction,
    network_passphrase: &str,
) -> Result<[u8; 32], DeployError> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(network_id(network_passphrase)),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    let bytes = payload.to_xdr(Limits::none())?;
    Ok(Sha256::digest(&bytes).into())
}

/// Apply exactly one signature from `keypair`.
///
/// The keypair must be the transaction's source account; any other
/// signature would be rejected for bad auth.
pub fn sign(
    simulated: &SimulatedTransaction,
    keypair: &SigningKeypair,
    network_passphrase: &str,
) -> Result<SignedTransaction, DeployError> {
    let tx = simulated.transaction();
    let source = match &tx.source_account {
        MuxedAccount::Ed25519(key) => key.0,
        MuxedAccount::MuxedEd25519(muxed) => muxed.ed25519.0,
    };
    if source != keypair.public_key() {
        return Err(DeployError::Signer(format!(
            "keypair {} is not the transaction source",
            keypair.account_id()
        )));
    }

    let hash = signature_payload_hash(tx, network_passphrase)?;
    let signature = keypair.decorated_signature(&hash)?;

    Ok(SignedTransaction {
        envelope: TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: tx.clone(),
            signatures: vec![signature].try_into()?,
        }),
        hash,
    })
}
