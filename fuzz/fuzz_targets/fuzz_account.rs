#![no_main]
//! Fuzz target for subnet and neuron account decoding.

use libfuzzer_sys::fuzz_target;
use registry_program::{AccountSchema, Neuron, Subnet};

fuzz_target!(|data: &[u8]| {
    if let Ok(subnet) = Subnet::from_bytes(data) {
        assert_eq!(subnet.to_bytes().expect("re-encode"), data);
    }
    if let Ok(neuron) = Neuron::from_bytes(data) {
        assert_eq!(neuron.to_bytes().expect("re-encode"), data);
    }
});
