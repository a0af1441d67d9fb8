#![forbid(unsafe_code)]

//! The registry state machine.
//!
//! `process` is pure: it sees the accounts the substrate loaded for a
//! transaction and returns the account changes to commit. The substrate
//! commits all of them or none.

use crate::derive::{neuron_address, subnet_address};
use crate::instruction::{
    CreateSubnetArgs, PruneNeuronArgs, RegisterNeuronArgs, RegistryInstruction,
    UpdateNeuronStatusArgs, UpdateSubnetConfigArgs,
};
use crate::state::{AccountSchema, Neuron, Subnet};
use crate::validation::{validate_caps, validate_metrics};
use registry_core::{AccountRecord, Address, DeriveError, InstructionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Grace period protecting new registrants from pruning (24h).
pub const DEFAULT_IMMUNITY_PERIOD_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub program_id: Address,
    pub consensus_authority: Address,
    pub staking_authority: Address,
    pub immunity_period_secs: i64,
}

impl ProgramConfig {
    pub fn new(consensus_authority: Address, staking_authority: Address) -> Self {
        Self {
            program_id: crate::REGISTRY_PROGRAM_ID,
            consensus_authority,
            staking_authority,
            immunity_period_secs: DEFAULT_IMMUNITY_PERIOD_SECS,
        }
    }
}

/// An account as the substrate hands it to the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAccount {
    pub address: Address,
    /// Marked signer *and* carried a valid signature.
    pub is_signer: bool,
    pub is_writable: bool,
    pub record: Option<AccountRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountChange {
    Write { address: Address, record: AccountRecord },
    Close { address: Address },
}

impl AccountChange {
    pub fn address(&self) -> &Address {
        match self {
            AccountChange::Write { address, .. } | AccountChange::Close { address } => address,
        }
    }
}

pub fn process(
    config: &ProgramConfig,
    accounts: &[LoadedAccount],
    data: &[u8],
    now: i64,
) -> Result<Vec<AccountChange>, InstructionError> {
    let ix = RegistryInstruction::unpack(data)?;
    check_duplicates(accounts)?;
    let cx = Invocation {
        config,
        accounts,
        now,
        name: ix.name(),
    };
    match ix {
        RegistryInstruction::CreateSubnet(a) => cx.create_subnet(&a),
        RegistryInstruction::RegisterNeuron(a) => cx.register_neuron(&a),
        RegistryInstruction::UpdateSubnetConfig(a) => cx.update_subnet_config(&a),
        RegistryInstruction::PruneNeuron(a) => cx.prune_neuron(&a),
        RegistryInstruction::UpdateNeuronStatus(a) => cx.update_neuron_status(&a),
    }
}

fn check_duplicates(accounts: &[LoadedAccount]) -> Result<(), InstructionError> {
    let mut writable = BTreeSet::new();
    for acc in accounts.iter().filter(|a| a.is_writable) {
        if !writable.insert(acc.address) {
            return Err(InstructionError::DuplicateAccount {
                account: acc.address,
            });
        }
    }
    // A writable account may not appear again read-only either.
    for acc in accounts.iter().filter(|a| !a.is_writable) {
        if writable.contains(&acc.address) {
            return Err(InstructionError::DuplicateAccount {
                account: acc.address,
            });
        }
    }
    Ok(())
}

struct Invocation<'a> {
    config: &'a ProgramConfig,
    accounts: &'a [LoadedAccount],
    now: i64,
    name: &'static str,
}

impl<'a> Invocation<'a> {
    /// The first `N` accounts; any further accounts are ignored.
    fn expect_accounts<const N: usize>(&self) -> Result<&'a [LoadedAccount; N], InstructionError> {
        self.accounts
            .get(..N)
            .and_then(|s| <&[LoadedAccount; N]>::try_from(s).ok())
            .ok_or(InstructionError::NotEnoughAccounts {
                needed: N,
                got: self.accounts.len(),
            })
    }

    fn program_id(&self) -> &Address {
        &self.config.program_id
    }

    fn require_signer(&self, acc: &LoadedAccount) -> Result<(), InstructionError> {
        if acc.is_signer {
            Ok(())
        } else {
            Err(InstructionError::Unauthenticated {
                account: acc.address,
            })
        }
    }

    fn require_writable(&self, acc: &LoadedAccount) -> Result<(), InstructionError> {
        if acc.is_writable {
            Ok(())
        } else {
            Err(InstructionError::ReadonlyAccount {
                account: acc.address,
            })
        }
    }

    fn unauthorized(&self, account: Address) -> InstructionError {
        InstructionError::Unauthorized {
            account,
            instruction: self.name.to_string(),
        }
    }

    fn require_address(
        &self,
        role: &str,
        acc: &LoadedAccount,
        expected: Result<registry_core::DerivedAddress, DeriveError>,
    ) -> Result<(), InstructionError> {
        let expected = expected
            .map_err(|e| InstructionError::InvalidInstruction {
                reason: format!("{role} address derivation failed: {e}"),
            })?
            .address;
        if acc.address != expected {
            return Err(InstructionError::AddressMismatch {
                role: role.to_string(),
                expected,
                actual: acc.address,
            });
        }
        Ok(())
    }

    fn load_subnet(&self, acc: &LoadedAccount, subnet_id: u16) -> Result<Subnet, InstructionError> {
        self.require_address("subnet", acc, subnet_address(self.program_id(), subnet_id))?;
        let record = acc
            .record
            .as_ref()
            .ok_or(InstructionError::SubnetNotFound { subnet_id })?;
        let subnet = Subnet::from_account(self.program_id(), record)?;
        if subnet.id != subnet_id {
            return Err(InstructionError::SchemaMismatch {
                schema: Subnet::NAME.to_string(),
                reason: format!("stored id {} at address of subnet {subnet_id}", subnet.id),
            });
        }
        Ok(subnet)
    }

    /// Load an existing neuron and confirm it sits at its own derivation.
    fn load_neuron(
        &self,
        acc: &LoadedAccount,
        uid: Option<u16>,
    ) -> Result<Neuron, InstructionError> {
        let record = acc.record.as_ref().ok_or(InstructionError::NeuronNotFound {
            address: acc.address,
            uid,
        })?;
        let neuron = Neuron::from_account(self.program_id(), record)?;
        self.require_address(
            "neuron",
            acc,
            neuron_address(self.program_id(), neuron.subnet_id, &neuron.hotkey),
        )?;
        Ok(neuron)
    }

    fn write<T: AccountSchema>(
        &self,
        acc: &LoadedAccount,
        value: &T,
    ) -> Result<AccountChange, InstructionError> {
        Ok(AccountChange::Write {
            address: acc.address,
            record: AccountRecord {
                owner: *self.program_id(),
                data: value.to_bytes()?,
            },
        })
    }

    fn create_subnet(&self, a: &CreateSubnetArgs) -> Result<Vec<AccountChange>, InstructionError> {
        let [subnet_acc, governor] = self.expect_accounts::<2>()?;
        validate_caps(a.max_neurons, a.validator_limit, 0)?;
        self.require_signer(governor)?;
        self.require_address("subnet", subnet_acc, subnet_address(self.program_id(), a.subnet_id))?;
        self.require_writable(subnet_acc)?;
        if subnet_acc.record.is_some() {
            return Err(InstructionError::SubnetAlreadyExists {
                subnet_id: a.subnet_id,
            });
        }

        let subnet = Subnet {
            id: a.subnet_id,
            governor: governor.address,
            max_neurons: a.max_neurons,
            validator_limit: a.validator_limit,
            incentive_function_hash: a.incentive_function_hash,
            emission_rate: a.emission_rate,
            created_at: self.now,
            neuron_count: 0,
        };
        debug!(event = "subnet_created", subnet_id = a.subnet_id, governor = %governor.address);
        Ok(vec![self.write(subnet_acc, &subnet)?])
    }

    fn register_neuron(
        &self,
        a: &RegisterNeuronArgs,
    ) -> Result<Vec<AccountChange>, InstructionError> {
        let [subnet_acc, neuron_acc, hotkey, coldkey] = self.expect_accounts::<4>()?;
        self.require_signer(hotkey)?;
        let mut subnet = self.load_subnet(subnet_acc, a.subnet_id)?;
        self.require_address(
            "neuron",
            neuron_acc,
            neuron_address(self.program_id(), a.subnet_id, &hotkey.address),
        )?;
        self.require_writable(subnet_acc)?;
        self.require_writable(neuron_acc)?;
        // Checked before capacity so a replayed registration reports itself.
        if neuron_acc.record.is_some() {
            return Err(InstructionError::NeuronAlreadyRegistered {
                subnet_id: a.subnet_id,
                hotkey: hotkey.address,
            });
        }
        if subnet.is_full() {
            return Err(InstructionError::SubnetFull {
                subnet_id: a.subnet_id,
                max_neurons: subnet.max_neurons,
            });
        }

        // Below the cap (<= 255), so the increment cannot overflow.
        let uid = subnet.neuron_count.saturating_add(1);
        subnet.neuron_count = uid;
        let neuron = Neuron {
            uid,
            subnet_id: a.subnet_id,
            hotkey: hotkey.address,
            coldkey: coldkey.address,
            stake: 0,
            rank: 0,
            trust: 0,
            incentive: 0,
            validator_trust: 0,
            is_validator: false,
            immunity_until: self.now.saturating_add(self.config.immunity_period_secs),
            registered_at: self.now,
        };
        debug!(event = "neuron_registered", subnet_id = a.subnet_id, uid, hotkey = %hotkey.address);
        Ok(vec![
            self.write(neuron_acc, &neuron)?,
            self.write(subnet_acc, &subnet)?,
        ])
    }

    fn update_subnet_config(
        &self,
        a: &UpdateSubnetConfigArgs,
    ) -> Result<Vec<AccountChange>, InstructionError> {
        let [subnet_acc, governor] = self.expect_accounts::<2>()?;
        self.require_signer(governor)?;
        let mut subnet = self.load_subnet(subnet_acc, a.subnet_id)?;
        if subnet.governor != governor.address {
            return Err(self.unauthorized(governor.address));
        }
        self.require_writable(subnet_acc)?;

        if let Some(v) = a.max_neurons {
            subnet.max_neurons = v;
        }
        if let Some(v) = a.validator_limit {
            subnet.validator_limit = v;
        }
        if let Some(v) = a.emission_rate {
            subnet.emission_rate = v;
        }
        if let Some(v) = a.incentive_function_hash {
            subnet.incentive_function_hash = v;
        }
        validate_caps(subnet.max_neurons, subnet.validator_limit, subnet.neuron_count)?;

        debug!(event = "subnet_config_updated", subnet_id = a.subnet_id);
        Ok(vec![self.write(subnet_acc, &subnet)?])
    }

    fn prune_neuron(&self, a: &PruneNeuronArgs) -> Result<Vec<AccountChange>, InstructionError> {
        let [subnet_acc, neuron_acc, authority, consensus] = self.expect_accounts::<4>()?;
        self.require_signer(authority)?;
        if consensus.address != self.config.consensus_authority {
            return Err(self.unauthorized(consensus.address));
        }
        if authority.address != self.config.consensus_authority {
            return Err(self.unauthorized(authority.address));
        }
        self.load_subnet(subnet_acc, a.subnet_id)?;
        let neuron = self.load_neuron(neuron_acc, Some(a.uid))?;
        if neuron.subnet_id != a.subnet_id || neuron.uid != a.uid {
            return Err(InstructionError::NeuronNotFound {
                address: neuron_acc.address,
                uid: Some(a.uid),
            });
        }
        self.require_writable(neuron_acc)?;
        if neuron.is_immune(self.now) {
            return Err(InstructionError::StillImmune {
                uid: neuron.uid,
                immunity_until: neuron.immunity_until,
            });
        }

        // neuron_count stays as the high-water mark: uids are never reused.
        debug!(event = "neuron_pruned", subnet_id = a.subnet_id, uid = a.uid);
        Ok(vec![AccountChange::Close {
            address: neuron_acc.address,
        }])
    }

    fn update_neuron_status(
        &self,
        a: &UpdateNeuronStatusArgs,
    ) -> Result<Vec<AccountChange>, InstructionError> {
        let [neuron_acc, authority, consensus, staking] = self.expect_accounts::<4>()?;
        self.require_signer(authority)?;
        if consensus.address != self.config.consensus_authority {
            return Err(self.unauthorized(consensus.address));
        }
        if staking.address != self.config.staking_authority {
            return Err(self.unauthorized(staking.address));
        }
        if authority.address != consensus.address && authority.address != staking.address {
            return Err(self.unauthorized(authority.address));
        }
        let mut neuron = self.load_neuron(neuron_acc, None)?;
        self.require_writable(neuron_acc)?;
        validate_metrics(a)?;

        if let Some(v) = a.rank {
            neuron.rank = v;
        }
        if let Some(v) = a.trust {
            neuron.trust = v;
        }
        if let Some(v) = a.incentive {
            neuron.incentive = v;
        }
        if let Some(v) = a.validator_trust {
            neuron.validator_trust = v;
        }
        if let Some(v) = a.is_validator {
            neuron.is_validator = v;
        }

        debug!(event = "neuron_status_updated", subnet_id = neuron.subnet_id, uid = neuron.uid);
        Ok(vec![self.write(neuron_acc, &neuron)?])
    }
}
