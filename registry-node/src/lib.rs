#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]

//! Caller-facing surface of the subnet registry: the client façade, bounded
//! confirmation polling, node configuration and signer key files.

pub mod client;
pub mod config;
pub mod confirm;
pub mod error;
pub mod keyfile;

pub use client::{RegistryClient, Submission};
pub use confirm::{await_status, ConfirmConfig};
pub use error::{ClientError, Outcome};
