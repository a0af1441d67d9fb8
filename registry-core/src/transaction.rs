#![forbid(unsafe_code)]

//! Transaction framing.
//!
//! - Signing message: `TRANSACTION_DOMAIN_V1 || canonical(message)`
//! - Transaction id: `blake3(signing message)`
//!
//! Signatures cover the message only, so the id is stable no matter which
//! order the signatures are attached in.

use crate::codec::{self, CodecError};
use crate::signing::{self, Keypair, Signature};
use crate::types::Address;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Domain separator (v1) to prevent cross-protocol replay.
pub const TRANSACTION_DOMAIN_V1: &[u8] = b"SUBNET-REGISTRY:TRANSACTION:V1\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("account {0} must sign but no keypair was provided")]
    MissingSigner(Address),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One account named by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// Program invocation: target program, ordered accounts, opaque data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    /// Distinct addresses that must sign, in first-appearance order.
    pub fn required_signers(&self) -> Vec<Address> {
        let mut seen = BTreeSet::new();
        self.accounts
            .iter()
            .filter(|m| m.is_signer && seen.insert(m.address))
            .map(|m| m.address)
            .collect()
    }
}

/// The signed part of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub instruction: Instruction,
    /// Caller-chosen; distinguishes otherwise identical submissions.
    pub nonce: u64,
}

impl Message {
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let body = codec::encode(self)?;
        let mut out = Vec::with_capacity(TRANSACTION_DOMAIN_V1.len() + body.len());
        out.extend_from_slice(TRANSACTION_DOMAIN_V1);
        out.extend_from_slice(&body);
        Ok(out)
    }
}

/// Transaction identifier.
///
/// Serialized as base64url (no padding) in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn from_base64url(s: &str) -> Result<Self, String> {
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s.as_bytes())
            .map_err(|e| format!("invalid base64url: {e}"))?;
        let bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected 32 bytes, got {}", decoded.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TxId").field(&self.to_base64url()).finish()
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Serialize for TxId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64url())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            TxId::from_base64url(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(TxId)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSignature {
    pub signer: Address,
    pub signature: Signature,
}

/// A message plus the signatures of its signers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub message: Message,
    pub signatures: Vec<SignerSignature>,
}

impl Transaction {
    /// Sign `instruction` with every keypair its signer metas require.
    ///
    /// Keypairs that no meta asks for are ignored.
    pub fn new_signed(
        instruction: Instruction,
        nonce: u64,
        keypairs: &[&Keypair],
    ) -> Result<Self, TransactionError> {
        let message = Message { instruction, nonce };
        let bytes = message.signing_bytes()?;
        let mut signatures = Vec::new();
        for signer in message.instruction.required_signers() {
            let kp = keypairs
                .iter()
                .find(|kp| kp.address() == signer)
                .ok_or(TransactionError::MissingSigner(signer))?;
            signatures.push(SignerSignature {
                signer,
                signature: kp.sign(&bytes),
            });
        }
        Ok(Self {
            message,
            signatures,
        })
    }

    pub fn id(&self) -> Result<TxId, CodecError> {
        let bytes = self.message.signing_bytes()?;
        Ok(TxId(*blake3::hash(&bytes).as_bytes()))
    }

    /// Addresses whose signature over the message verifies.
    ///
    /// Invalid or foreign signatures are dropped, not rejected: the program
    /// decides what an absent signer means.
    pub fn authenticated_signers(&self) -> Result<BTreeSet<Address>, CodecError> {
        let bytes = self.message.signing_bytes()?;
        Ok(self
            .signatures
            .iter()
            .filter(|s| signing::verify(&s.signer, &bytes, &s.signature))
            .map(|s| s.signer)
            .collect())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ix(signers: &[Address]) -> Instruction {
        Instruction {
            program_id: Address([9; 32]),
            accounts: signers
                .iter()
                .map(|a| AccountMeta::readonly(*a, true))
                .chain(std::iter::once(AccountMeta::writable(Address([1; 32]), false)))
                .collect(),
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn missing_signer_is_reported() {
        let a = Keypair::from_seed([1; 32]);
        let b = Keypair::from_seed([2; 32]);
        let err = Transaction::new_signed(ix(&[a.address(), b.address()]), 0, &[&a]).unwrap_err();
        assert_eq!(err, TransactionError::MissingSigner(b.address()));
    }

    #[test]
    fn signatures_verify_and_tampering_drops_them() {
        let a = Keypair::from_seed([1; 32]);
        let mut tx = Transaction::new_signed(ix(&[a.address()]), 7, &[&a]).unwrap();
        assert_eq!(
            tx.authenticated_signers().unwrap(),
            BTreeSet::from([a.address()])
        );

        tx.message.nonce = 8;
        assert!(tx.authenticated_signers().unwrap().is_empty());
    }

    #[test]
    fn id_depends_on_nonce_not_signature_order() {
        let a = Keypair::from_seed([1; 32]);
        let b = Keypair::from_seed([2; 32]);
        let tx1 = Transaction::new_signed(ix(&[a.address(), b.address()]), 1, &[&a, &b]).unwrap();
        let mut tx2 = tx1.clone();
        tx2.signatures.reverse();
        assert_eq!(tx1.id().unwrap(), tx2.id().unwrap());

        let tx3 = Transaction::new_signed(ix(&[a.address(), b.address()]), 2, &[&b, &a]).unwrap();
        assert_ne!(tx1.id().unwrap(), tx3.id().unwrap());
    }

    #[test]
    fn duplicate_signer_metas_sign_once() {
        let a = Keypair::from_seed([1; 32]);
        let tx = Transaction::new_signed(ix(&[a.address(), a.address()]), 0, &[&a]).unwrap();
        assert_eq!(tx.signatures.len(), 1);
    }

    #[test]
    fn wire_bytes_roundtrip_and_tx_id_json() {
        let a = Keypair::from_seed([3; 32]);
        let tx = Transaction::new_signed(ix(&[a.address()]), 42, &[&a]).unwrap();
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);

        let id = tx.id().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_base64url()));
        assert_eq!(serde_json::from_str::<TxId>(&json).unwrap(), id);
    }
}
