#![forbid(unsafe_code)]

use registry_core::Keypair;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("failed reading key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid key in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Load a signer from a file holding a hex-encoded 32-byte Ed25519 seed.
pub fn read_keypair_file(path: &Path) -> Result<Keypair, KeyFileError> {
    if let Some(mode) = loose_mode(path) {
        warn!(
            event = "key_file_permissions",
            key_path = %path.display(),
            mode = format!("{mode:o}"),
            "signer seed is readable by group or others"
        );
    }
    let raw = std::fs::read_to_string(path).map_err(|source| KeyFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Keypair::from_seed_hex(raw.trim()).map_err(|reason| KeyFileError::Invalid {
        path: path.to_path_buf(),
        reason,
    })
}

/// Permission bits of `path` when group or others have any access.
#[cfg(unix)]
fn loose_mode(path: &Path) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path).ok()?.permissions().mode() & 0o777;
    (mode & 0o077 != 0).then_some(mode)
}

#[cfg(not(unix))]
fn loose_mode(_path: &Path) -> Option<u32> {
    None
}
