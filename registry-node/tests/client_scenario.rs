use registry_core::{
    AccountRecord, Address, ApplyOutcome, ErrorKind, Hash32, InstructionError, Keypair,
    ManualClock, SubmitResult, Substrate, SubstrateError, Transaction, TxId, TxStatus,
};
use registry_node::{ClientError, ConfirmConfig, Outcome, RegistryClient};
use registry_program::{
    CreateSubnetRequest, Ledger, NeuronRef, ProgramConfig, UpdateNeuronStatusArgs,
    UpdateSubnetConfigRequest,
};
use std::sync::Arc;

const START: i64 = 1_700_000_000;

struct Fixture {
    clock: Arc<ManualClock>,
    ledger: Arc<Ledger>,
    client: RegistryClient<Arc<Ledger>>,
    governor: Keypair,
    consensus: Keypair,
    staking: Keypair,
}

impl Fixture {
    fn new() -> Self {
        let consensus = Keypair::from_seed([0xC0; 32]);
        let staking = Keypair::from_seed([0x57; 32]);
        let config = ProgramConfig::new(consensus.address(), staking.address());
        let clock = Arc::new(ManualClock::new(START));
        let ledger = Arc::new(Ledger::temporary(config.clone(), clock.clone()).expect("ledger"));
        let client = RegistryClient::new(ledger.clone(), &config).with_confirm(ConfirmConfig {
            max_polls: 2,
            poll_interval_ms: 0,
        });
        Self {
            clock,
            ledger,
            client,
            governor: Keypair::from_seed([0x60; 32]),
            consensus,
            staking,
        }
    }

    fn create_default_subnet(&self) {
        self.client
            .create_subnet(&self.governor, &subnet_one(255))
            .expect("create subnet");
    }
}

fn subnet_one(max_neurons: u16) -> CreateSubnetRequest {
    CreateSubnetRequest {
        subnet_id: 1,
        max_neurons,
        validator_limit: 64u16.min(max_neurons),
        emission_rate: 1_000_000,
        incentive_function_hash: Hash32([0; 32]),
    }
}

fn raw_subnet(fx: &Fixture) -> AccountRecord {
    let addr = fx.client.subnet_address(1).expect("address");
    fx.ledger
        .read_account(&addr)
        .expect("read")
        .expect("subnet exists")
}

#[test]
fn end_to_end_create_register_and_reconfigure() {
    let fx = Fixture::new();
    let created = fx
        .client
        .create_subnet(&fx.governor, &subnet_one(255))
        .expect("create");
    assert_eq!(created.address, fx.client.subnet_address(1).expect("address"));
    assert_eq!(created.receipt.outcome, ApplyOutcome::Applied);
    assert_eq!(created.subnet, None);

    let h1 = Keypair::from_seed([0x11; 32]);
    let c1 = Address([0xC1; 32]);
    let reg = fx.client.register_neuron(&h1, &c1, 1).expect("register h1");
    assert_eq!(
        reg.address,
        fx.client.neuron_address(1, &h1.address()).expect("address")
    );
    assert_eq!(reg.subnet, Some(created.address));

    let n1 = fx
        .client
        .get_neuron(1, &h1.address())
        .expect("read")
        .expect("neuron");
    assert_eq!(n1.uid, 1);
    assert_eq!(n1.stake, 0);
    assert!(!n1.is_validator);
    assert_eq!(n1.coldkey, c1);
    assert_eq!(n1.registered_at, START);
    let subnet = fx.client.get_subnet(1).expect("read").expect("subnet");
    assert_eq!(subnet.neuron_count, 1);

    let h2 = Keypair::from_seed([0x22; 32]);
    fx.client
        .register_neuron(&h2, &Address([0xC2; 32]), 1)
        .expect("register h2");
    let n2 = fx
        .client
        .get_neuron(1, &h2.address())
        .expect("read")
        .expect("neuron");
    assert_eq!(n2.uid, 2);
    let before = fx.client.get_subnet(1).expect("read").expect("subnet");
    assert_eq!(before.neuron_count, 2);

    fx.client
        .update_subnet_config(
            &fx.governor,
            &UpdateSubnetConfigRequest {
                subnet_id: 1,
                emission_rate: Some(2_000_000),
                ..Default::default()
            },
        )
        .expect("update");
    let after = fx.client.get_subnet(1).expect("read").expect("subnet");
    assert_eq!(after.emission_rate, 2_000_000);
    assert_eq!(
        registry_program::Subnet {
            emission_rate: before.emission_rate,
            ..after
        },
        before
    );
}

#[test]
fn out_of_range_caps_are_rejected_before_submission() {
    let fx = Fixture::new();
    for max in [0u16, 256, 300] {
        let err = fx
            .client
            .create_subnet(&fx.governor, &subnet_one(max))
            .expect_err("invalid cap");
        assert!(
            matches!(
                err,
                ClientError::Instruction(InstructionError::InvalidMaxNeurons { value }) if value == max
            ),
            "{err:?}"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }
    assert_eq!(fx.ledger.slot().expect("slot"), 0);
    assert!(fx.client.get_subnet(1).expect("read").is_none());
}

#[test]
fn reads_of_absent_records_are_none() {
    let fx = Fixture::new();
    assert!(fx.client.get_subnet(42).expect("read").is_none());
    assert!(fx
        .client
        .get_neuron(42, &Address([9; 32]))
        .expect("read")
        .is_none());

    fx.create_default_subnet();
    assert!(fx
        .client
        .get_neuron(1, &Address([9; 32]))
        .expect("read")
        .is_none());
}

#[test]
fn non_governor_update_is_unauthorized_and_changes_nothing() {
    let fx = Fixture::new();
    fx.create_default_subnet();
    let before = raw_subnet(&fx);

    let intruder = Keypair::from_seed([0x66; 32]);
    let err = fx
        .client
        .update_subnet_config(
            &intruder,
            &UpdateSubnetConfigRequest {
                subnet_id: 1,
                emission_rate: Some(5),
                ..Default::default()
            },
        )
        .expect_err("not governor");
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(err.outcome(), Outcome::NotApplied);
    assert_eq!(raw_subnet(&fx), before);
}

#[test]
fn duplicate_registration_fails_and_full_subnet_is_reported() {
    let fx = Fixture::new();
    fx.client
        .create_subnet(&fx.governor, &subnet_one(2))
        .expect("create");

    let h1 = Keypair::from_seed([0x11; 32]);
    fx.client
        .register_neuron(&h1, &Address([1; 32]), 1)
        .expect("first");
    let err = fx
        .client
        .register_neuron(&h1, &Address([1; 32]), 1)
        .expect_err("second");
    assert_eq!(err.code(), "neuron_already_registered");

    fx.client
        .register_neuron(&Keypair::from_seed([0x22; 32]), &Address([2; 32]), 1)
        .expect("fills the subnet");
    let err = fx
        .client
        .register_neuron(&Keypair::from_seed([0x33; 32]), &Address([3; 32]), 1)
        .expect_err("full");
    assert_eq!(err.code(), "subnet_full");

    let err = fx
        .client
        .register_neuron(&Keypair::from_seed([0x44; 32]), &Address([4; 32]), 7)
        .expect_err("no subnet");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn prune_waits_for_immunity_and_keeps_the_high_water_mark() {
    let fx = Fixture::new();
    fx.create_default_subnet();
    let hotkey = Keypair::from_seed([0x11; 32]);
    fx.client
        .register_neuron(&hotkey, &Address([1; 32]), 1)
        .expect("register");

    let err = fx
        .client
        .prune_neuron(&fx.consensus, 1, 1, &hotkey.address())
        .expect_err("immune");
    assert_eq!(err.code(), "still_immune");

    fx.clock.advance(registry_program::processor::DEFAULT_IMMUNITY_PERIOD_SECS);

    let err = fx
        .client
        .prune_neuron(&fx.governor, 1, 1, &hotkey.address())
        .expect_err("governor is not the pruning authority");
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let pruned = fx
        .client
        .prune_neuron(&fx.consensus, 1, 1, &hotkey.address())
        .expect("prune");
    assert_eq!(pruned.receipt.closed, vec![pruned.address]);
    assert_eq!(
        pruned.subnet,
        Some(fx.client.subnet_address(1).expect("address"))
    );
    assert!(fx
        .client
        .get_neuron(1, &hotkey.address())
        .expect("read")
        .is_none());
    assert_eq!(
        fx.client
            .get_subnet(1)
            .expect("read")
            .expect("subnet")
            .neuron_count,
        1
    );
}

#[test]
fn status_updates_come_from_collaborator_authorities() {
    let fx = Fixture::new();
    fx.create_default_subnet();
    let hotkey = Keypair::from_seed([0x11; 32]);
    fx.client
        .register_neuron(&hotkey, &Address([1; 32]), 1)
        .expect("register");
    let neuron = NeuronRef {
        subnet_id: 1,
        hotkey: hotkey.address(),
    };

    fx.client
        .update_neuron_status(
            &fx.staking,
            neuron,
            UpdateNeuronStatusArgs {
                rank: Some(5_000),
                is_validator: Some(true),
                ..Default::default()
            },
        )
        .expect("staking update");
    fx.client
        .update_neuron_status(
            &fx.consensus,
            neuron,
            UpdateNeuronStatusArgs {
                trust: Some(10_000),
                ..Default::default()
            },
        )
        .expect("consensus update");
    let n = fx
        .client
        .get_neuron(1, &hotkey.address())
        .expect("read")
        .expect("neuron");
    assert_eq!((n.rank, n.trust, n.incentive), (5_000, 10_000, 0));
    assert!(n.is_validator);

    let err = fx
        .client
        .update_neuron_status(&fx.governor, neuron, UpdateNeuronStatusArgs::default())
        .expect_err("governor");
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = fx
        .client
        .update_neuron_status(
            &fx.consensus,
            neuron,
            UpdateNeuronStatusArgs {
                validator_trust: Some(10_001),
                ..Default::default()
            },
        )
        .expect_err("out of scale");
    assert_eq!(err.code(), "metric_out_of_range");
}

/// Applies transactions but never reports their status.
struct Lagging(Arc<Ledger>);

impl Substrate for Lagging {
    fn submit(&self, tx: &Transaction) -> Result<SubmitResult, SubstrateError> {
        self.0.submit(tx)
    }

    fn get_status(&self, _tx_id: &TxId) -> Result<Option<TxStatus>, SubstrateError> {
        Ok(None)
    }

    fn read_account(&self, address: &Address) -> Result<Option<AccountRecord>, SubstrateError> {
        self.0.read_account(address)
    }
}

#[test]
fn unconfirmed_registration_is_ambiguous_and_retry_is_safe() {
    let fx = Fixture::new();
    fx.create_default_subnet();
    let lagging = RegistryClient::new(Lagging(fx.ledger.clone()), fx.ledger.config())
        .with_confirm(ConfirmConfig {
            max_polls: 3,
            poll_interval_ms: 0,
        });

    let hotkey = Keypair::from_seed([0x11; 32]);
    let err = lagging
        .register_neuron(&hotkey, &Address([1; 32]), 1)
        .expect_err("never confirmed");
    assert!(
        matches!(err, ClientError::ConfirmationTimeout { polls: 3, .. }),
        "{err:?}"
    );
    assert_eq!(err.outcome(), Outcome::Unknown);
    assert!(err.is_retryable());

    // It did apply; retrying cannot register the hotkey twice.
    assert!(fx
        .client
        .get_neuron(1, &hotkey.address())
        .expect("read")
        .is_some());
    let err = fx
        .client
        .register_neuron(&hotkey, &Address([1; 32]), 1)
        .expect_err("retry");
    assert_eq!(err.code(), "neuron_already_registered");
    assert_eq!(
        fx.client
            .get_subnet(1)
            .expect("read")
            .expect("subnet")
            .neuron_count,
        1
    );
}
