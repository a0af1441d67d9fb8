#![no_main]
//! Fuzz target for instruction decoding.
//!
//! Arbitrary bytes must decode to an instruction or a typed error, never a
//! panic; anything that decodes must re-encode to the same bytes.

use libfuzzer_sys::fuzz_target;
use registry_program::RegistryInstruction;

fuzz_target!(|data: &[u8]| {
    let Ok(ix) = RegistryInstruction::unpack(data) else {
        return;
    };
    let packed = ix.pack().expect("decoded instruction re-encodes");
    assert_eq!(packed.as_slice(), data);
});
