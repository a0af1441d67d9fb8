#![forbid(unsafe_code)]

//! Fixed-layout account records.
//!
//! Field order is the on-ledger layout. Subnet (86 bytes):
//!
//! | off | field |
//! |----:|-------|
//! | 0 | id u16 |
//! | 2 | governor [32] |
//! | 34 | max_neurons u8 |
//! | 35 | validator_limit u8 |
//! | 36 | incentive_function_hash [32] |
//! | 68 | emission_rate u64 |
//! | 76 | created_at i64 |
//! | 84 | neuron_count u16 |
//!
//! Neuron (125 bytes): uid 0, subnet_id 2, hotkey 4, coldkey 36, stake 68,
//! rank 76, trust 84, incentive 92, validator_trust 100, is_validator 108,
//! immunity_until 109, registered_at 117.
//!
//! TODO: prefix both layouts with a version byte before the first layout change.

use registry_core::codec;
use registry_core::{AccountRecord, Address, Hash32, InstructionError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const SUBNET_LEN: usize = 86;
pub const NEURON_LEN: usize = 125;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: u16,
    pub governor: Address,
    pub max_neurons: u8,
    pub validator_limit: u8,
    pub incentive_function_hash: Hash32,
    pub emission_rate: u64,
    pub created_at: i64,
    /// Registrations ever made; the next uid is `neuron_count + 1`.
    pub neuron_count: u16,
}

impl Subnet {
    pub fn is_full(&self) -> bool {
        self.neuron_count >= u16::from(self.max_neurons)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neuron {
    pub uid: u16,
    pub subnet_id: u16,
    pub hotkey: Address,
    pub coldkey: Address,
    pub stake: u64,
    pub rank: u64,
    pub trust: u64,
    pub incentive: u64,
    pub validator_trust: u64,
    pub is_validator: bool,
    pub immunity_until: i64,
    pub registered_at: i64,
}

impl Neuron {
    pub fn is_immune(&self, now: i64) -> bool {
        now < self.immunity_until
    }
}

/// A record type with a fixed byte layout, owned by the registry program.
pub trait AccountSchema: Serialize + DeserializeOwned {
    const NAME: &'static str;
    const LEN: usize;

    fn to_bytes(&self) -> Result<Vec<u8>, InstructionError> {
        let bytes = codec::encode(self)?;
        if bytes.len() != Self::LEN {
            return Err(InstructionError::Encoding {
                reason: format!("{} encoded to {} bytes", Self::NAME, bytes.len()),
            });
        }
        Ok(bytes)
    }

    fn from_bytes(data: &[u8]) -> Result<Self, InstructionError> {
        if data.len() != Self::LEN {
            return Err(schema_mismatch::<Self>(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                data.len()
            )));
        }
        codec::decode(data).map_err(|e| schema_mismatch::<Self>(e.to_string()))
    }

    /// Decode a stored account, checking ownership first.
    fn from_account(program_id: &Address, record: &AccountRecord) -> Result<Self, InstructionError> {
        if record.owner != *program_id {
            return Err(schema_mismatch::<Self>(format!(
                "owned by {}, not {program_id}",
                record.owner
            )));
        }
        Self::from_bytes(&record.data)
    }
}

fn schema_mismatch<T: AccountSchema + ?Sized>(reason: String) -> InstructionError {
    InstructionError::SchemaMismatch {
        schema: T::NAME.to_string(),
        reason,
    }
}

impl AccountSchema for Subnet {
    const NAME: &'static str = "subnet";
    const LEN: usize = SUBNET_LEN;
}

impl AccountSchema for Neuron {
    const NAME: &'static str = "neuron";
    const LEN: usize = NEURON_LEN;
}
