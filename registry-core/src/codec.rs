#![allow(clippy::module_name_repetitions)]

//! Canonical binary codec.
//!
//! Every byte that crosses the wire or lands in an account goes through the
//! encoder below: fixed-width integers, little-endian, no trailing bytes.
//! With these options serde shapes map onto the registry layout directly:
//!
//! - `u16`/`u64`/`i64` are 2/8/8 bytes, little-endian
//! - `[u8; 32]` (and the `Address`/`Hash32` newtypes) are 32 raw bytes
//! - `bool` is one byte, `0` or `1`
//! - `Option<T>` is a presence byte (`0` absent, `1` present) followed by `T`

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Codec errors. Decoding never panics on hostile input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated buffer: input ended after {available} bytes")]
    TruncatedBuffer { available: usize },
    #[error("trailing bytes: {extra} bytes left after decoding")]
    TrailingBytes { extra: usize },
    #[error("invalid presence tag {0} (expected 0 or 1)")]
    InvalidTag(u8),
    #[error("invalid bool byte {0} (expected 0 or 1)")]
    InvalidBool(u8),
    #[error("malformed encoding: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Stable snake_case code, shared with the matching `InstructionError` variants.
    pub const fn code(&self) -> &'static str {
        match self {
            CodecError::TruncatedBuffer { .. } => "truncated_buffer",
            CodecError::TrailingBytes { .. } => "trailing_bytes",
            CodecError::InvalidTag(_) => "invalid_tag",
            CodecError::InvalidBool(_) => "invalid_bool",
            CodecError::Malformed(_) => "encoding",
        }
    }

    fn from_bincode(err: bincode::Error, available: usize) -> Self {
        match *err {
            bincode::ErrorKind::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                CodecError::TruncatedBuffer { available }
            }
            bincode::ErrorKind::InvalidTagEncoding(tag) => {
                CodecError::InvalidTag(u8::try_from(tag).unwrap_or(u8::MAX))
            }
            bincode::ErrorKind::InvalidBoolEncoding(b) => CodecError::InvalidBool(b),
            other => CodecError::Malformed(other.to_string()),
        }
    }
}

/// Canonical encoder options (fixed-int, little-endian, no trailing bytes).
fn encoder() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Serialize using canonical encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    encoder()
        .serialize(value)
        .map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decode a value that must occupy the whole of `bytes`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (value, rest) = decode_prefix::<T>(bytes)?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes { extra: rest.len() });
    }
    Ok(value)
}

/// Decode a value from the front of `bytes`, returning the unread tail.
pub fn decode_prefix<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, &[u8]), CodecError> {
    let mut rest = bytes;
    let value = encoder()
        .deserialize_from(&mut rest)
        .map_err(|e| CodecError::from_bincode(e, bytes.len()))?;
    Ok((value, rest))
}

/// Little-endian bytes of a `u16`, as used for numeric derivation seeds.
pub fn u16_seed(v: u16) -> [u8; 2] {
    v.to_le_bytes()
}
