#![forbid(unsafe_code)]

//! Ed25519 signer keys.
//!
//! - Signing scheme: Ed25519
//! - A signer's address is its 32-byte verifying key
//! - Signatures are hex in JSON and 64 raw bytes in binary encodings

use crate::types::Address;
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ed25519 keypair held by a caller (governor, hotkey, authority).
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Parse a hex-encoded 32-byte seed, as stored in key files.
    pub fn from_seed_hex(s: &str) -> Result<Self, String> {
        let raw = hex::decode(s.trim()).map_err(|e| format!("invalid hex seed: {e}"))?;
        let seed: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected 32-byte seed, got {}", raw.len()))?;
        Ok(Self::from_seed(seed))
    }

    pub fn address(&self) -> Address {
        Address(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Raw Ed25519 signature bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature").field(&self.to_hex()).finish()
    }
}

/// Verify `signature` over `message` against a signer address.
///
/// Addresses that are not valid Ed25519 points (derived addresses) never verify.
pub fn verify(signer: &Address, message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    key.verify(message, &sig).is_ok()
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            // serde only derives arrays up to 32 elements; split into halves.
            let (lo, hi) = self.0.split_at(32);
            let mut a = [0u8; 32];
            let mut b = [0u8; 32];
            a.copy_from_slice(lo);
            b.copy_from_slice(hi);
            (a, b).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut out = [0u8; 64];
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let raw = hex::decode(s).map_err(serde::de::Error::custom)?;
            if raw.len() != 64 {
                return Err(serde::de::Error::custom(format!(
                    "expected 64-byte signature, got {}",
                    raw.len()
                )));
            }
            out.copy_from_slice(&raw);
        } else {
            let (a, b) = <([u8; 32], [u8; 32])>::deserialize(deserializer)?;
            out[..32].copy_from_slice(&a);
            out[32..].copy_from_slice(&b);
        }
        Ok(Signature(out))
    }
}
