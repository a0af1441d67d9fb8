#![forbid(unsafe_code)]

//! Registry instruction set and its wire format.
//!
//! Exact rule (v1): `data = tag || canonical(args)` with
//!
//! | tag | instruction | args |
//! |----:|-------------|------|
//! | 0 | CreateSubnet | subnet_id u16, max_neurons u8, validator_limit u8, emission_rate u64, incentive_function_hash [32] |
//! | 1 | RegisterNeuron | subnet_id u16 |
//! | 2 | UpdateSubnetConfig | subnet_id u16, opt u8, opt u8, opt u64, opt [32] |
//! | 3 | PruneNeuron | subnet_id u16, uid u16 |
//! | 4 | UpdateNeuronStatus | opt u64 x4, opt bool |
//!
//! The builders at the bottom are the only place account lists are put
//! together; the processor reads them back in the same order.

use crate::derive::{neuron_address, subnet_address};
use registry_core::codec::{self, CodecError};
use registry_core::{AccountMeta, Address, DeriveError, Hash32, Instruction, InstructionError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubnetArgs {
    pub subnet_id: u16,
    pub max_neurons: u8,
    pub validator_limit: u8,
    pub emission_rate: u64,
    pub incentive_function_hash: Hash32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterNeuronArgs {
    pub subnet_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateSubnetConfigArgs {
    pub subnet_id: u16,
    pub max_neurons: Option<u8>,
    pub validator_limit: Option<u8>,
    pub emission_rate: Option<u64>,
    pub incentive_function_hash: Option<Hash32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneNeuronArgs {
    pub subnet_id: u16,
    pub uid: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateNeuronStatusArgs {
    pub rank: Option<u64>,
    pub trust: Option<u64>,
    pub incentive: Option<u64>,
    pub validator_trust: Option<u64>,
    pub is_validator: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryInstruction {
    CreateSubnet(CreateSubnetArgs),
    RegisterNeuron(RegisterNeuronArgs),
    UpdateSubnetConfig(UpdateSubnetConfigArgs),
    PruneNeuron(PruneNeuronArgs),
    UpdateNeuronStatus(UpdateNeuronStatusArgs),
}

impl RegistryInstruction {
    pub const fn tag(&self) -> u8 {
        match self {
            RegistryInstruction::CreateSubnet(_) => 0,
            RegistryInstruction::RegisterNeuron(_) => 1,
            RegistryInstruction::UpdateSubnetConfig(_) => 2,
            RegistryInstruction::PruneNeuron(_) => 3,
            RegistryInstruction::UpdateNeuronStatus(_) => 4,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            RegistryInstruction::CreateSubnet(_) => "create_subnet",
            RegistryInstruction::RegisterNeuron(_) => "register_neuron",
            RegistryInstruction::UpdateSubnetConfig(_) => "update_subnet_config",
            RegistryInstruction::PruneNeuron(_) => "prune_neuron",
            RegistryInstruction::UpdateNeuronStatus(_) => "update_neuron_status",
        }
    }

    pub fn pack(&self) -> Result<Vec<u8>, CodecError> {
        let body = match self {
            RegistryInstruction::CreateSubnet(a) => codec::encode(a)?,
            RegistryInstruction::RegisterNeuron(a) => codec::encode(a)?,
            RegistryInstruction::UpdateSubnetConfig(a) => codec::encode(a)?,
            RegistryInstruction::PruneNeuron(a) => codec::encode(a)?,
            RegistryInstruction::UpdateNeuronStatus(a) => codec::encode(a)?,
        };
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(self.tag());
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, InstructionError> {
        let (&tag, rest) = data
            .split_first()
            .ok_or(CodecError::TruncatedBuffer { available: 0 })?;
        let ix = match tag {
            0 => RegistryInstruction::CreateSubnet(codec::decode(rest)?),
            1 => RegistryInstruction::RegisterNeuron(codec::decode(rest)?),
            2 => RegistryInstruction::UpdateSubnetConfig(codec::decode(rest)?),
            3 => RegistryInstruction::PruneNeuron(codec::decode(rest)?),
            4 => RegistryInstruction::UpdateNeuronStatus(codec::decode(rest)?),
            other => {
                return Err(InstructionError::InvalidInstruction {
                    reason: format!("unknown instruction tag {other}"),
                })
            }
        };
        Ok(ix)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Derive(#[from] DeriveError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// An instruction plus the derived address of the account it targets.
///
/// `subnet` is set when a neuron-targeting instruction also writes its subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltInstruction {
    pub instruction: Instruction,
    pub address: Address,
    pub subnet: Option<Address>,
}

fn build(
    program_id: &Address,
    ix: &RegistryInstruction,
    accounts: Vec<AccountMeta>,
    address: Address,
    subnet: Option<Address>,
) -> Result<BuiltInstruction, BuildError> {
    Ok(BuiltInstruction {
        instruction: Instruction {
            program_id: *program_id,
            accounts,
            data: ix.pack()?,
        },
        address,
        subnet,
    })
}

/// Accounts: subnet (w), governor (s, w).
pub fn create_subnet(
    program_id: &Address,
    governor: &Address,
    args: CreateSubnetArgs,
) -> Result<BuiltInstruction, BuildError> {
    let subnet = subnet_address(program_id, args.subnet_id)?.address;
    build(
        program_id,
        &RegistryInstruction::CreateSubnet(args),
        vec![
            AccountMeta::writable(subnet, false),
            AccountMeta::writable(*governor, true),
        ],
        subnet,
        None,
    )
}

/// Accounts: subnet (w), neuron (w), hotkey (s), coldkey.
pub fn register_neuron(
    program_id: &Address,
    hotkey: &Address,
    coldkey: &Address,
    subnet_id: u16,
) -> Result<BuiltInstruction, BuildError> {
    let subnet = subnet_address(program_id, subnet_id)?.address;
    let neuron = neuron_address(program_id, subnet_id, hotkey)?.address;
    build(
        program_id,
        &RegistryInstruction::RegisterNeuron(RegisterNeuronArgs { subnet_id }),
        vec![
            AccountMeta::writable(subnet, false),
            AccountMeta::writable(neuron, false),
            AccountMeta::readonly(*hotkey, true),
            AccountMeta::readonly(*coldkey, false),
        ],
        neuron,
        Some(subnet),
    )
}

/// Accounts: subnet (w), governor (s).
pub fn update_subnet_config(
    program_id: &Address,
    governor: &Address,
    args: UpdateSubnetConfigArgs,
) -> Result<BuiltInstruction, BuildError> {
    let subnet = subnet_address(program_id, args.subnet_id)?.address;
    build(
        program_id,
        &RegistryInstruction::UpdateSubnetConfig(args),
        vec![
            AccountMeta::writable(subnet, false),
            AccountMeta::readonly(*governor, true),
        ],
        subnet,
        None,
    )
}

/// Accounts: subnet (w), neuron (w), authority (s), consensus authority.
///
/// The neuron is located through its hotkey; `uid` is cross-checked by the program.
pub fn prune_neuron(
    program_id: &Address,
    authority: &Address,
    consensus: &Address,
    args: PruneNeuronArgs,
    hotkey: &Address,
) -> Result<BuiltInstruction, BuildError> {
    let subnet = subnet_address(program_id, args.subnet_id)?.address;
    let neuron = neuron_address(program_id, args.subnet_id, hotkey)?.address;
    build(
        program_id,
        &RegistryInstruction::PruneNeuron(args),
        vec![
            AccountMeta::writable(subnet, false),
            AccountMeta::writable(neuron, false),
            AccountMeta::readonly(*authority, true),
            AccountMeta::readonly(*consensus, false),
        ],
        neuron,
        Some(subnet),
    )
}

/// Accounts: neuron (w), authority (s), consensus authority, staking authority.
pub fn update_neuron_status(
    program_id: &Address,
    authority: &Address,
    consensus: &Address,
    staking: &Address,
    neuron: &NeuronRef,
    args: UpdateNeuronStatusArgs,
) -> Result<BuiltInstruction, BuildError> {
    let neuron = neuron_address(program_id, neuron.subnet_id, &neuron.hotkey)?.address;
    build(
        program_id,
        &RegistryInstruction::UpdateNeuronStatus(args),
        vec![
            AccountMeta::writable(neuron, false),
            AccountMeta::readonly(*authority, true),
            AccountMeta::readonly(*consensus, false),
            AccountMeta::readonly(*staking, false),
        ],
        neuron,
        None,
    )
}

/// Natural key of a neuron: its subnet and hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeuronRef {
    pub subnet_id: u16,
    pub hotkey: Address,
}
