#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::cast_precision_loss)]
#![deny(clippy::cast_possible_truncation)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::cast_sign_loss)]
#![deny(clippy::disallowed_types)]

//! Shared primitives for the subnet registry.
//!
//! This crate is deliberately free of registry semantics: it provides the
//! canonical codec, derived addresses, Ed25519 transaction framing, the error
//! taxonomy and the contract every execution substrate implements. The
//! registry program and the client build on top of it.

pub mod address;
pub mod clock;
pub mod codec;
pub mod error;
pub mod signing;
pub mod substrate;
pub mod transaction;
pub mod types;

pub use address::{create_derived_address, find_derived_address, DeriveError, DerivedAddress};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::CodecError;
pub use error::{ErrorKind, InstructionError};
pub use signing::{Keypair, Signature};
pub use substrate::{
    AccountRecord, ApplyOutcome, ExecutionReceipt, SubmitResult, Substrate, SubstrateError,
    TxStatus,
};
pub use transaction::{AccountMeta, Instruction, Message, Transaction, TransactionError, TxId};
pub use types::{Address, Hash32};
