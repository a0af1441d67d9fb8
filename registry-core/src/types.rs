#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte account address.
///
/// Binary codecs see 32 raw bytes; JSON sees lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 32]);

/// 32-byte opaque digest (e.g. an incentive function hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

macro_rules! bytes32_newtype {
    ($ty:ident) => {
        impl $ty {
            pub const LEN: usize = 32;

            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_bytes(self) -> [u8; 32] {
                self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, String> {
                let raw = hex::decode(s.trim()).map_err(|e| format!("invalid hex: {e}"))?;
                Self::try_from(raw.as_slice())
            }
        }

        impl TryFrom<&[u8]> for $ty {
            type Error = String;

            fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
                let bytes: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| format!("expected 32 bytes, got {}", raw.len()))?;
                Ok(Self(bytes))
            }
        }

        impl From<[u8; 32]> for $ty {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $ty {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&self.to_hex()).finish()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    $ty::from_hex(&s).map_err(serde::de::Error::custom)
                } else {
                    <[u8; 32]>::deserialize(deserializer).map($ty)
                }
            }
        }
    };
}

bytes32_newtype!(Address);
bytes32_newtype!(Hash32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_json_is_hex() {
        let a = Address([0xAB; 32]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Hash32::from_hex("abcd").unwrap_err();
        assert!(err.contains("expected 32 bytes"), "{err}");
    }
}
