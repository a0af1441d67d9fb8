#![forbid(unsafe_code)]

//! Caller-facing request shapes.
//!
//! Caps are carried as `u16` so that values the wire cannot hold (256, 300)
//! are still representable and get rejected by name instead of truncated.

use crate::instruction::{CreateSubnetArgs, UpdateSubnetConfigArgs};
use crate::validation::{narrow_max_neurons, narrow_validator_limit};
use registry_core::{Hash32, InstructionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubnetRequest {
    pub subnet_id: u16,
    pub max_neurons: u16,
    pub validator_limit: u16,
    pub emission_rate: u64,
    pub incentive_function_hash: Hash32,
}

impl CreateSubnetRequest {
    pub fn into_args(self) -> Result<CreateSubnetArgs, InstructionError> {
        let max_neurons = narrow_max_neurons(self.max_neurons)?;
        let validator_limit = narrow_validator_limit(self.validator_limit, self.max_neurons)?;
        Ok(CreateSubnetArgs {
            subnet_id: self.subnet_id,
            max_neurons,
            validator_limit,
            emission_rate: self.emission_rate,
            incentive_function_hash: self.incentive_function_hash,
        })
    }
}

/// Partial subnet update; `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateSubnetConfigRequest {
    pub subnet_id: u16,
    #[serde(default)]
    pub max_neurons: Option<u16>,
    #[serde(default)]
    pub validator_limit: Option<u16>,
    #[serde(default)]
    pub emission_rate: Option<u64>,
    #[serde(default)]
    pub incentive_function_hash: Option<Hash32>,
}

impl UpdateSubnetConfigRequest {
    /// Range checks that need no ledger state. Checks against the stored
    /// record (`neuron_count`, an untouched cap) happen when the instruction
    /// is applied.
    pub fn into_args(self) -> Result<UpdateSubnetConfigArgs, InstructionError> {
        let max_neurons = self.max_neurons.map(narrow_max_neurons).transpose()?;
        let validator_limit = match self.validator_limit {
            // Without a new cap the stored one is unknown here; only bound the width.
            Some(v) => Some(narrow_validator_limit(
                v,
                self.max_neurons.unwrap_or(u16::from(u8::MAX)),
            )?),
            None => None,
        };
        Ok(UpdateSubnetConfigArgs {
            subnet_id: self.subnet_id,
            max_neurons,
            validator_limit,
            emission_rate: self.emission_rate,
            incentive_function_hash: self.incentive_function_hash,
        })
    }
}
