//! Execution substrate contract.
//!
//! The substrate owns durable state and applies each transaction atomically
//! against the accounts it names. This module is **transport-agnostic**:
//! anything that can submit a [`Transaction`], report its status and read an
//! account implements [`Substrate`].
#![forbid(unsafe_code)]

use crate::codec::CodecError;
use crate::error::InstructionError;
use crate::transaction::{Transaction, TxId};
use crate::types::Address;
use serde::{Deserialize, Serialize};

/// Raw account as stored by the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Program that owns (and alone may write) the account.
    pub owner: Address,
    pub data: Vec<u8>,
}

/// Result of handing a transaction to the substrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    /// Whether the substrate accepted the transaction for execution.
    pub accepted: bool,
    /// Whether the transaction id was already applied (idempotent replay).
    #[serde(default)]
    pub already_known: bool,
    pub tx_id: TxId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied,
    AlreadyApplied,
}

/// Proof that a transaction was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub schema_version: u32,
    pub tx_id: TxId,
    pub outcome: ApplyOutcome,
    /// Monotonic position of the transaction in the ledger.
    pub slot: u64,
    /// Substrate time the instruction was applied at (unix seconds).
    pub applied_at: i64,
    /// Accounts created or overwritten.
    #[serde(default)]
    pub written: Vec<Address>,
    /// Accounts removed.
    #[serde(default)]
    pub closed: Vec<Address>,
}

/// Execution status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TxStatus {
    Applied { receipt: ExecutionReceipt },
    Failed { error: InstructionError },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstrateError {
    /// Temporarily unreachable or busy; the request may be retried.
    #[error("substrate unavailable: {0}")]
    Unavailable(String),
    /// The transaction cannot be executed as submitted.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl SubstrateError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SubstrateError::Unavailable(_))
    }
}

/// Capabilities the registry needs from its execution environment.
pub trait Substrate: Send + Sync {
    fn submit(&self, tx: &Transaction) -> Result<SubmitResult, SubstrateError>;
    fn get_status(&self, tx_id: &TxId) -> Result<Option<TxStatus>, SubstrateError>;
    fn read_account(&self, address: &Address) -> Result<Option<AccountRecord>, SubstrateError>;
}

impl<S: Substrate + ?Sized> Substrate for std::sync::Arc<S> {
    fn submit(&self, tx: &Transaction) -> Result<SubmitResult, SubstrateError> {
        (**self).submit(tx)
    }

    fn get_status(&self, tx_id: &TxId) -> Result<Option<TxStatus>, SubstrateError> {
        (**self).get_status(tx_id)
    }

    fn read_account(&self, address: &Address) -> Result<Option<AccountRecord>, SubstrateError> {
        (**self).read_account(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_json_is_tagged() {
        let status = TxStatus::Failed {
            error: InstructionError::SubnetNotFound { subnet_id: 4 },
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["status"], "failed");
        assert_eq!(v["error"]["code"], "subnet_not_found");
        assert_eq!(serde_json::from_value::<TxStatus>(v).unwrap(), status);
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(SubstrateError::Unavailable("busy".into()).is_transient());
        assert!(!SubstrateError::Rejected("bad".into()).is_transient());
        assert!(!SubstrateError::Storage("io".into()).is_transient());
    }
}
