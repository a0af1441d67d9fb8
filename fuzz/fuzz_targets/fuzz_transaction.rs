#![no_main]
//! Fuzz target for signed transaction decoding and signature checks.

use libfuzzer_sys::fuzz_target;
use registry_core::Transaction;

fuzz_target!(|data: &[u8]| {
    // Limit input size
    if data.len() > 64 * 1024 {
        return;
    }
    let Ok(tx) = Transaction::from_bytes(data) else {
        return;
    };
    let _ = tx.id();
    let _ = tx.authenticated_signers();
});
