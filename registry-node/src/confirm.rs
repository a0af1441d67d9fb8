#![forbid(unsafe_code)]
// serde derive visitors reference float types even when the structs do not.
#![allow(clippy::disallowed_types)]

//! Bounded wait for a submitted transaction to reach a final status.

use crate::error::ClientError;
use registry_core::{Substrate, TxId, TxStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmConfig {
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_max_polls() -> u32 {
    20
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Poll `get_status` until the substrate reports a final status.
///
/// Transient substrate errors use up a poll; any other substrate error is
/// returned immediately. After `max_polls` polls without a status the result
/// is [`ClientError::ConfirmationTimeout`], which makes no claim about
/// whether the transaction applied.
pub fn await_status<S: Substrate + ?Sized>(
    substrate: &S,
    tx_id: &TxId,
    cfg: &ConfirmConfig,
) -> Result<TxStatus, ClientError> {
    let interval = Duration::from_millis(cfg.poll_interval_ms);
    for poll in 1..=cfg.max_polls {
        match substrate.get_status(tx_id) {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => debug!(event = "confirm_pending", tx_id = %tx_id, poll),
            Err(e) if e.is_transient() => {
                warn!(event = "confirm_poll_failed", tx_id = %tx_id, poll, error = %e)
            }
            Err(e) => return Err(e.into()),
        }
        if poll < cfg.max_polls && !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
    warn!(event = "confirm_timeout", tx_id = %tx_id, polls = cfg.max_polls);
    Err(ClientError::ConfirmationTimeout {
        tx_id: *tx_id,
        polls: cfg.max_polls,
    })
}
