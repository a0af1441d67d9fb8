use proptest::prelude::*;
use registry_core::{Address, Hash32, Keypair, ManualClock, Substrate, Transaction, TxStatus};
use registry_program::instruction as build;
use registry_program::{
    neuron_address, AccountSchema, CreateSubnetArgs, Ledger, Neuron, ProgramConfig,
    REGISTRY_PROGRAM_ID,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

fn ledger() -> Arc<Ledger> {
    let config = ProgramConfig::new(Address([0xC0; 32]), Address([0x57; 32]));
    Arc::new(Ledger::temporary(config, Arc::new(ManualClock::new(0))).expect("ledger"))
}

fn create_subnet(ledger: &Ledger, subnet_id: u16, max_neurons: u8) {
    let governor = Keypair::from_seed([0x60; 32]);
    let built = build::create_subnet(
        &REGISTRY_PROGRAM_ID,
        &governor.address(),
        CreateSubnetArgs {
            subnet_id,
            max_neurons,
            validator_limit: 0,
            emission_rate: 0,
            incentive_function_hash: Hash32::default(),
        },
    )
    .expect("build");
    let tx = Transaction::new_signed(built.instruction, u64::from(subnet_id), &[&governor])
        .expect("sign");
    ledger.submit(&tx).expect("submit");
}

fn register(ledger: &Ledger, subnet_id: u16, hotkey: &Keypair, nonce: u64) -> TxStatus {
    let built = build::register_neuron(
        &REGISTRY_PROGRAM_ID,
        &hotkey.address(),
        &Address([0xCC; 32]),
        subnet_id,
    )
    .expect("build");
    let tx = Transaction::new_signed(built.instruction, nonce, &[hotkey]).expect("sign");
    let res = ledger.submit(&tx).expect("submit");
    ledger
        .get_status(&res.tx_id)
        .expect("status")
        .expect("recorded")
}

fn uid_of(ledger: &Ledger, subnet_id: u16, hotkey: &Address) -> u16 {
    let addr = neuron_address(&REGISTRY_PROGRAM_ID, subnet_id, hotkey)
        .expect("derive")
        .address;
    let record = ledger.read_account(&addr).expect("read").expect("exists");
    Neuron::from_account(&REGISTRY_PROGRAM_ID, &record)
        .expect("decode")
        .uid
}

fn hotkey(i: usize) -> Keypair {
    let mut seed = [0u8; 32];
    seed[..8].copy_from_slice(&(i as u64).to_le_bytes());
    seed[31] = 0xFF;
    Keypair::from_seed(seed)
}

#[test]
fn threads_racing_on_one_subnet_get_unique_dense_uids() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 4;
    let ledger = ledger();
    create_subnet(&ledger, 1, 255);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                let mut keys = Vec::new();
                for k in 0..PER_THREAD {
                    let kp = hotkey(t * PER_THREAD + k);
                    let status = register(&ledger, 1, &kp, 0);
                    assert!(matches!(status, TxStatus::Applied { .. }), "{status:?}");
                    keys.push(kp.address());
                }
                keys
            })
        })
        .collect();

    let mut uids = BTreeSet::new();
    for h in handles {
        for addr in h.join().expect("thread") {
            assert!(uids.insert(uid_of(&ledger, 1, &addr)), "duplicate uid");
        }
    }
    let n = u16::try_from(THREADS * PER_THREAD).expect("fits");
    assert_eq!(uids, (1..=n).collect::<BTreeSet<_>>());
}

#[test]
fn racing_past_the_cap_admits_exactly_max_neurons() {
    let ledger = ledger();
    create_subnet(&ledger, 2, 5);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let ledger = ledger.clone();
            std::thread::spawn(move || register(&ledger, 2, &hotkey(100 + i), 0))
        })
        .collect();
    let mut applied = 0;
    for h in handles {
        match h.join().expect("thread") {
            TxStatus::Applied { .. } => applied += 1,
            TxStatus::Failed { error } => assert_eq!(error.code(), "subnet_full"),
        }
    }
    assert_eq!(applied, 5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any interleaving of registrations across two subnets, including
    /// repeats, yields uids 1..N per subnet in order of first success.
    #[test]
    fn interleaved_registrations_stay_dense(
        ops in proptest::collection::vec((1u16..=2, 0usize..6), 1..24)
    ) {
        let ledger = ledger();
        create_subnet(&ledger, 1, 255);
        create_subnet(&ledger, 2, 255);

        let mut next_uid: HashMap<u16, u16> = HashMap::new();
        let mut expected: HashMap<(u16, usize), u16> = HashMap::new();
        for (nonce, (subnet_id, who)) in ops.iter().copied().enumerate() {
            let kp = hotkey(who);
            let status = register(&ledger, subnet_id, &kp, nonce as u64);
            match expected.get(&(subnet_id, who)) {
                Some(_) => match status {
                    TxStatus::Failed { error } => {
                        prop_assert_eq!(error.code(), "neuron_already_registered")
                    }
                    TxStatus::Applied { .. } => prop_assert!(false, "double registration applied"),
                },
                None => {
                    prop_assert!(
                        matches!(status, TxStatus::Applied { .. }),
                        "registration not applied: {:?}",
                        status
                    );
                    let uid = next_uid.entry(subnet_id).or_insert(0);
                    *uid += 1;
                    expected.insert((subnet_id, who), *uid);
                }
            }
        }
        for ((subnet_id, who), uid) in expected {
            prop_assert_eq!(uid_of(&ledger, subnet_id, &hotkey(who).address()), uid);
        }
    }
}
