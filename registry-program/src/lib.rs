#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]
#![deny(clippy::disallowed_types)]

//! Subnet registry program.
//!
//! Subnets are task domains with a population cap and a governor; neurons
//! are participants registered under a subnet with a dense per-subnet uid.
//! This crate holds the fixed-layout records, the instruction wire format,
//! the state machine that applies instructions, and a sled-backed ledger
//! that runs it atomically.

pub mod derive;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod request;
pub mod state;
pub mod validation;

use registry_core::Address;

/// Identity of the registry program (owner of every subnet and neuron account).
pub const REGISTRY_PROGRAM_ID: Address = Address(*b"subnet-registry-program-v1\0\0\0\0\0\0");

pub use derive::{neuron_address, subnet_address};
pub use instruction::{
    BuildError, BuiltInstruction, CreateSubnetArgs, NeuronRef, PruneNeuronArgs,
    RegisterNeuronArgs, RegistryInstruction, UpdateNeuronStatusArgs, UpdateSubnetConfigArgs,
};
pub use ledger::{Ledger, LedgerError};
pub use processor::{process, AccountChange, LoadedAccount, ProgramConfig};
pub use request::{CreateSubnetRequest, UpdateSubnetConfigRequest};
pub use state::{AccountSchema, Neuron, Subnet, NEURON_LEN, SUBNET_LEN};
