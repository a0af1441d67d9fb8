#![forbid(unsafe_code)]

//! Registry error taxonomy shared by the program, the ledger and the client.
//!
//! Error codes are part of the operator contract: do not rename or reuse them.

use crate::codec::CodecError;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used to decide how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A deterministic precondition failed; resubmitting unchanged fails again.
    Validation,
    /// The wrong party signed, or a required signature is missing.
    Authorization,
    /// A referenced account does not exist.
    NotFound,
    /// Bytes could not be decoded.
    Encoding,
    /// Execution or transport failure; outcome may be unknown.
    Substrate,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Substrate => "substrate",
        }
    }
}

/// Errors raised while applying a registry instruction.
///
/// Every variant names the offending field or account so callers can act on it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum InstructionError {
    #[error("invalid max_neurons {value} (must be 1..=255 and >= neuron_count)")]
    InvalidMaxNeurons { value: u16 },
    #[error("invalid validator_limit {value} (must be <= max_neurons {max_neurons})")]
    InvalidValidatorLimit { value: u16, max_neurons: u16 },
    #[error("{field} {value} exceeds the metric scale (0..=10000)")]
    MetricOutOfRange { field: String, value: u64 },
    #[error("subnet {subnet_id} already exists")]
    SubnetAlreadyExists { subnet_id: u16 },
    #[error("subnet {subnet_id} not found")]
    SubnetNotFound { subnet_id: u16 },
    #[error("subnet {subnet_id} is full (max_neurons {max_neurons})")]
    SubnetFull { subnet_id: u16, max_neurons: u8 },
    #[error("hotkey {hotkey} is already registered in subnet {subnet_id}")]
    NeuronAlreadyRegistered { subnet_id: u16, hotkey: Address },
    #[error("neuron account {address} not found (uid {uid:?})")]
    NeuronNotFound { address: Address, uid: Option<u16> },
    #[error("neuron {uid} is immune until {immunity_until}")]
    StillImmune { uid: u16, immunity_until: i64 },
    #[error("{account} did not sign the transaction")]
    Unauthenticated { account: Address },
    #[error("{account} is not authorized for {instruction}")]
    Unauthorized { account: Address, instruction: String },
    #[error("{role} account {actual} does not match expected {expected}")]
    AddressMismatch {
        role: String,
        expected: Address,
        actual: Address,
    },
    #[error("account {account} listed more than once as writable")]
    DuplicateAccount { account: Address },
    #[error("instruction needs {needed} accounts, got {got}")]
    NotEnoughAccounts { needed: usize, got: usize },
    #[error("account {account} is not writable")]
    ReadonlyAccount { account: Address },
    #[error("account does not match {schema} schema: {reason}")]
    SchemaMismatch { schema: String, reason: String },
    #[error("invalid instruction: {reason}")]
    InvalidInstruction { reason: String },
    #[error("truncated buffer: input ended after {available} bytes")]
    TruncatedBuffer { available: usize },
    #[error("trailing bytes: {extra} bytes left after decoding")]
    TrailingBytes { extra: usize },
    #[error("invalid presence tag {tag} (expected 0 or 1)")]
    InvalidTag { tag: u8 },
    #[error("invalid bool byte {value} (expected 0 or 1)")]
    InvalidBool { value: u8 },
    #[error("encoding error: {reason}")]
    Encoding { reason: String },
}

impl InstructionError {
    /// Stable snake_case code (matches the serde tag).
    pub const fn code(&self) -> &'static str {
        match self {
            InstructionError::InvalidMaxNeurons { .. } => "invalid_max_neurons",
            InstructionError::InvalidValidatorLimit { .. } => "invalid_validator_limit",
            InstructionError::MetricOutOfRange { .. } => "metric_out_of_range",
            InstructionError::SubnetAlreadyExists { .. } => "subnet_already_exists",
            InstructionError::SubnetNotFound { .. } => "subnet_not_found",
            InstructionError::SubnetFull { .. } => "subnet_full",
            InstructionError::NeuronAlreadyRegistered { .. } => "neuron_already_registered",
            InstructionError::NeuronNotFound { .. } => "neuron_not_found",
            InstructionError::StillImmune { .. } => "still_immune",
            InstructionError::Unauthenticated { .. } => "unauthenticated",
            InstructionError::Unauthorized { .. } => "unauthorized",
            InstructionError::AddressMismatch { .. } => "address_mismatch",
            InstructionError::DuplicateAccount { .. } => "duplicate_account",
            InstructionError::NotEnoughAccounts { .. } => "not_enough_accounts",
            InstructionError::ReadonlyAccount { .. } => "readonly_account",
            InstructionError::SchemaMismatch { .. } => "schema_mismatch",
            InstructionError::InvalidInstruction { .. } => "invalid_instruction",
            InstructionError::TruncatedBuffer { .. } => "truncated_buffer",
            InstructionError::TrailingBytes { .. } => "trailing_bytes",
            InstructionError::InvalidTag { .. } => "invalid_tag",
            InstructionError::InvalidBool { .. } => "invalid_bool",
            InstructionError::Encoding { .. } => "encoding",
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            InstructionError::Unauthenticated { .. } | InstructionError::Unauthorized { .. } => {
                ErrorKind::Authorization
            }
            InstructionError::SubnetNotFound { .. } | InstructionError::NeuronNotFound { .. } => {
                ErrorKind::NotFound
            }
            InstructionError::SchemaMismatch { .. }
            | InstructionError::InvalidInstruction { .. }
            | InstructionError::TruncatedBuffer { .. }
            | InstructionError::TrailingBytes { .. }
            | InstructionError::InvalidTag { .. }
            | InstructionError::InvalidBool { .. }
            | InstructionError::Encoding { .. } => ErrorKind::Encoding,
            _ => ErrorKind::Validation,
        }
    }
}

impl From<CodecError> for InstructionError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::TruncatedBuffer { available } => {
                InstructionError::TruncatedBuffer { available }
            }
            CodecError::TrailingBytes { extra } => InstructionError::TrailingBytes { extra },
            CodecError::InvalidTag(tag) => InstructionError::InvalidTag { tag },
            CodecError::InvalidBool(value) => InstructionError::InvalidBool { value },
            CodecError::Malformed(reason) => InstructionError::Encoding { reason },
        }
    }
}
