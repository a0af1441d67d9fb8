#![forbid(unsafe_code)]

//! Registry client façade.
//!
//! One call per instruction kind. Every call derives the addresses it needs,
//! signs and submits a transaction, then waits (bounded) for the substrate to
//! report its status. No account state is kept between calls; preconditions
//! are checked by the program against the substrate's current records.

use crate::confirm::{await_status, ConfirmConfig};
use crate::error::ClientError;
use registry_core::{
    Address, ApplyOutcome, ExecutionReceipt, Keypair, Substrate, SubstrateError, Transaction,
    TxStatus,
};
use registry_program::instruction as build;
use registry_program::{
    AccountSchema, BuiltInstruction, CreateSubnetRequest, Neuron, NeuronRef, ProgramConfig,
    PruneNeuronArgs, Subnet, UpdateNeuronStatusArgs, UpdateSubnetConfigRequest,
};
use serde::Serialize;
use tracing::info;

/// Addresses an instruction derived, plus its receipt.
///
/// `address` is the targeted account; `subnet` is the parent subnet for
/// registrations and prunes, which write both accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Address>,
    pub receipt: ExecutionReceipt,
}

#[derive(Debug, Clone)]
pub struct RegistryClient<S> {
    substrate: S,
    program_id: Address,
    consensus_authority: Address,
    staking_authority: Address,
    confirm: ConfirmConfig,
}

impl<S: Substrate> RegistryClient<S> {
    pub fn new(substrate: S, program: &ProgramConfig) -> Self {
        Self {
            substrate,
            program_id: program.program_id,
            consensus_authority: program.consensus_authority,
            staking_authority: program.staking_authority,
            confirm: ConfirmConfig::default(),
        }
    }

    pub fn with_confirm(mut self, confirm: ConfirmConfig) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    pub fn subnet_address(&self, subnet_id: u16) -> Result<Address, ClientError> {
        Ok(registry_program::subnet_address(&self.program_id, subnet_id)
            .map_err(build::BuildError::from)?
            .address)
    }

    pub fn neuron_address(&self, subnet_id: u16, hotkey: &Address) -> Result<Address, ClientError> {
        Ok(
            registry_program::neuron_address(&self.program_id, subnet_id, hotkey)
                .map_err(build::BuildError::from)?
                .address,
        )
    }

    pub fn create_subnet(
        &self,
        governor: &Keypair,
        req: &CreateSubnetRequest,
    ) -> Result<Submission, ClientError> {
        let args = req.into_args()?;
        let built = build::create_subnet(&self.program_id, &governor.address(), args)?;
        self.execute("create_subnet", built, &[governor])
    }

    pub fn register_neuron(
        &self,
        hotkey: &Keypair,
        coldkey: &Address,
        subnet_id: u16,
    ) -> Result<Submission, ClientError> {
        let built = build::register_neuron(&self.program_id, &hotkey.address(), coldkey, subnet_id)?;
        self.execute("register_neuron", built, &[hotkey])
    }

    pub fn update_subnet_config(
        &self,
        governor: &Keypair,
        req: &UpdateSubnetConfigRequest,
    ) -> Result<Submission, ClientError> {
        let args = req.into_args()?;
        let built = build::update_subnet_config(&self.program_id, &governor.address(), args)?;
        self.execute("update_subnet_config", built, &[governor])
    }

    /// Prune the neuron registered by `hotkey`; `uid` must match its record.
    pub fn prune_neuron(
        &self,
        authority: &Keypair,
        subnet_id: u16,
        uid: u16,
        hotkey: &Address,
    ) -> Result<Submission, ClientError> {
        let built = build::prune_neuron(
            &self.program_id,
            &authority.address(),
            &self.consensus_authority,
            PruneNeuronArgs { subnet_id, uid },
            hotkey,
        )?;
        self.execute("prune_neuron", built, &[authority])
    }

    pub fn update_neuron_status(
        &self,
        authority: &Keypair,
        neuron: NeuronRef,
        args: UpdateNeuronStatusArgs,
    ) -> Result<Submission, ClientError> {
        registry_program::validation::validate_metrics(&args)?;
        let built = build::update_neuron_status(
            &self.program_id,
            &authority.address(),
            &self.consensus_authority,
            &self.staking_authority,
            &neuron,
            args,
        )?;
        self.execute("update_neuron_status", built, &[authority])
    }

    /// `Ok(None)` when no subnet was ever created under `subnet_id`.
    pub fn get_subnet(&self, subnet_id: u16) -> Result<Option<Subnet>, ClientError> {
        self.subnet_at(&self.subnet_address(subnet_id)?)
    }

    /// `Ok(None)` when `hotkey` holds no registration under `subnet_id`.
    pub fn get_neuron(&self, subnet_id: u16, hotkey: &Address) -> Result<Option<Neuron>, ClientError> {
        self.neuron_at(&self.neuron_address(subnet_id, hotkey)?)
    }

    pub fn subnet_at(&self, address: &Address) -> Result<Option<Subnet>, ClientError> {
        self.read(address)
    }

    pub fn neuron_at(&self, address: &Address) -> Result<Option<Neuron>, ClientError> {
        self.read(address)
    }

    fn read<T: AccountSchema>(&self, address: &Address) -> Result<Option<T>, ClientError> {
        let Some(record) = self.substrate.read_account(address)? else {
            return Ok(None);
        };
        Ok(Some(T::from_account(&self.program_id, &record)?))
    }

    fn execute(
        &self,
        name: &'static str,
        built: BuiltInstruction,
        signers: &[&Keypair],
    ) -> Result<Submission, ClientError> {
        let BuiltInstruction {
            instruction,
            address,
            subnet,
        } = built;
        let tx = Transaction::new_signed(instruction, rand::random::<u64>(), signers)?;
        let submitted = self.substrate.submit(&tx)?;
        let tx_id = submitted.tx_id;
        info!(
            event = "tx_submitted",
            instruction = name,
            tx_id = %tx_id,
            address = %address,
            already_known = submitted.already_known
        );
        if !submitted.accepted {
            return Err(SubstrateError::Rejected(
                submitted
                    .message
                    .unwrap_or_else(|| "transaction not accepted".to_string()),
            )
            .into());
        }

        match await_status(&self.substrate, &tx_id, &self.confirm)? {
            TxStatus::Applied { mut receipt } => {
                if submitted.already_known {
                    receipt.outcome = ApplyOutcome::AlreadyApplied;
                }
                info!(
                    event = "tx_confirmed",
                    instruction = name,
                    tx_id = %tx_id,
                    slot = receipt.slot
                );
                Ok(Submission {
                    address,
                    subnet,
                    receipt,
                })
            }
            TxStatus::Failed { error } => {
                info!(
                    event = "tx_failed",
                    instruction = name,
                    tx_id = %tx_id,
                    code = error.code()
                );
                Err(error.into())
            }
        }
    }
}
