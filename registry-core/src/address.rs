#![forbid(unsafe_code)]

//! Derived (program-controlled) addresses.
//!
//! Exact rule (v1):
//! `candidate = blake3(DOMAIN || program_id || len(ns) || ns || (len(seed) || seed)* || bump)`
//!
//! A candidate is only accepted when it does not decode as a compressed
//! Ed25519 point, so nobody can hold a signing key for it.

use crate::types::Address;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

/// Domain separator (v1) for derived addresses.
pub const DERIVED_ADDRESS_DOMAIN_V1: &[u8] = b"SUBNET-REGISTRY:DERIVED_ADDRESS:V1\n";

pub const MAX_NAMESPACE_LEN: usize = 32;
pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("namespace is empty")]
    EmptyNamespace,
    #[error("namespace is {len} bytes (max {MAX_NAMESPACE_LEN})")]
    NamespaceTooLong { len: usize },
    #[error("{count} seeds given (max {MAX_SEEDS})")]
    TooManySeeds { count: usize },
    #[error("seed {index} is {len} bytes (max {MAX_SEED_LEN})")]
    SeedTooLong { index: usize, len: usize },
    #[error("no bump yields an off-curve address")]
    NoViableBump,
    #[error("bump {bump} yields an on-curve address")]
    OnCurve { bump: u8 },
}

/// A derived address together with the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedAddress {
    pub address: Address,
    pub bump: u8,
}

/// Whether `bytes` is a valid compressed Ed25519 point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    VerifyingKey::from_bytes(bytes).is_ok()
}

fn check_inputs(namespace: &[u8], seeds: &[&[u8]]) -> Result<(), DeriveError> {
    if namespace.is_empty() {
        return Err(DeriveError::EmptyNamespace);
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(DeriveError::NamespaceTooLong {
            len: namespace.len(),
        });
    }
    if seeds.len() > MAX_SEEDS {
        return Err(DeriveError::TooManySeeds { count: seeds.len() });
    }
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(DeriveError::SeedTooLong {
                index,
                len: seed.len(),
            });
        }
    }
    Ok(())
}

// Lengths fit in one byte once `check_inputs` has passed.
fn len_byte(len: usize) -> [u8; 1] {
    [u8::try_from(len).unwrap_or(u8::MAX)]
}

fn candidate(program_id: &Address, namespace: &[u8], seeds: &[&[u8]], bump: u8) -> [u8; 32] {
    let mut h = blake3::Hasher::new();
    h.update(DERIVED_ADDRESS_DOMAIN_V1);
    h.update(program_id.as_bytes());
    h.update(&len_byte(namespace.len()));
    h.update(namespace);
    for seed in seeds {
        h.update(&len_byte(seed.len()));
        h.update(seed);
    }
    h.update(&[bump]);
    *h.finalize().as_bytes()
}

/// Re-derive the address for a known bump.
pub fn create_derived_address(
    program_id: &Address,
    namespace: &[u8],
    seeds: &[&[u8]],
    bump: u8,
) -> Result<Address, DeriveError> {
    check_inputs(namespace, seeds)?;
    let bytes = candidate(program_id, namespace, seeds, bump);
    if is_on_curve(&bytes) {
        return Err(DeriveError::OnCurve { bump });
    }
    Ok(Address(bytes))
}

/// Search bumps from 255 down to 0 and return the first off-curve address.
pub fn find_derived_address(
    program_id: &Address,
    namespace: &[u8],
    seeds: &[&[u8]],
) -> Result<DerivedAddress, DeriveError> {
    check_inputs(namespace, seeds)?;
    for bump in (0..=u8::MAX).rev() {
        let bytes = candidate(program_id, namespace, seeds, bump);
        if !is_on_curve(&bytes) {
            return Ok(DerivedAddress {
                address: Address(bytes),
                bump,
            });
        }
    }
    Err(DeriveError::NoViableBump)
}
