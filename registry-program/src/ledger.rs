#![forbid(unsafe_code)]

//! sled-backed reference substrate.
//!
//! Two trees:
//! - `accounts`: `acct:<hex address>` -> canonical `AccountRecord`
//! - `transactions`: applied markers, JSON receipts, failure records, slot counter
//!
//! Each submission runs inside one multi-tree sled transaction, so the
//! account writes, the receipt, the applied marker and the slot bump land
//! together or not at all. sled retries conflicting transactions, which is
//! what keeps uid assignment dense under concurrent registration.

use crate::instruction::RegistryInstruction;
use crate::processor::{process, AccountChange, LoadedAccount, ProgramConfig};
use registry_core::clock::format_unix;
use registry_core::codec::{self, CodecError};
use registry_core::{
    AccountRecord, Address, ApplyOutcome, Clock, ExecutionReceipt, InstructionError, SubmitResult,
    Substrate, SubstrateError, Transaction, TxId, TxStatus,
};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const RECEIPT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("db error: {0}")]
    Db(#[from] sled::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<LedgerError> for SubstrateError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Codec(c) => SubstrateError::Codec(c),
            other => SubstrateError::Storage(other.to_string()),
        }
    }
}

pub struct Ledger {
    db: sled::Db,
    accounts: sled::Tree,
    transactions: sled::Tree,
    config: ProgramConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    pub fn open(
        path: impl AsRef<Path>,
        config: ProgramConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        Self::from_db(sled::open(path)?, config, clock)
    }

    /// In-memory ledger that is discarded on drop.
    pub fn temporary(config: ProgramConfig, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, config, clock)
    }

    fn from_db(
        db: sled::Db,
        config: ProgramConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let accounts = db.open_tree("accounts")?;
        let transactions = db.open_tree("transactions")?;
        Ok(Self {
            db,
            accounts,
            transactions,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Number of transactions applied so far.
    pub fn slot(&self) -> Result<u64, LedgerError> {
        match self.transactions.get(keys::slot())? {
            Some(v) => decode_u64(&v).map_err(LedgerError::Decode),
            None => Ok(0),
        }
    }

    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn get_account(&self, address: &Address) -> Result<Option<AccountRecord>, LedgerError> {
        let Some(v) = self.accounts.get(keys::account(address))? else {
            return Ok(None);
        };
        Ok(Some(codec::decode(&v)?))
    }

    pub fn get_receipt(&self, tx_id: &TxId) -> Result<Option<ExecutionReceipt>, LedgerError> {
        let Some(v) = self.transactions.get(keys::receipt(tx_id))? else {
            return Ok(None);
        };
        serde_json::from_slice(&v)
            .map(Some)
            .map_err(|e| LedgerError::Decode(format!("failed decoding receipt json: {e}")))
    }

    /// Verify signatures and apply `tx` atomically.
    pub fn apply(&self, tx: &Transaction) -> Result<Applied, ApplyError> {
        let tx_id = tx.id()?;
        let instruction = &tx.message.instruction;
        if instruction.program_id != self.config.program_id {
            return Err(ApplyError::Rejected(format!(
                "unknown program {}",
                instruction.program_id
            )));
        }
        let authenticated = tx.authenticated_signers()?;

        let r = (&self.accounts, &self.transactions).transaction(|(accounts, txs)| {
            if txs.get(keys::applied(&tx_id))?.is_some() {
                let Some(existing) = txs.get(keys::receipt(&tx_id))? else {
                    return Err(abort_store("applied marker without receipt".to_string()));
                };
                let mut receipt: ExecutionReceipt = serde_json::from_slice(&existing)
                    .map_err(|e| abort_store(e.to_string()))?;
                receipt.outcome = ApplyOutcome::AlreadyApplied;
                return Ok(receipt);
            }
            let receipt = self.apply_tx(accounts, txs, tx, tx_id, &authenticated)?;
            Ok(receipt)
        });

        match r {
            Ok(receipt) => Ok(Applied { receipt }),
            Err(TransactionError::Abort(TxError::Instruction(e))) => {
                self.record_failure(&tx_id, &e)?;
                Err(ApplyError::Instruction(e))
            }
            Err(TransactionError::Abort(TxError::Store(s))) => Err(ApplyError::Store(s)),
            Err(TransactionError::Storage(e)) => Err(ApplyError::Store(e.to_string())),
        }
    }

    fn apply_tx(
        &self,
        accounts: &TransactionalTree,
        txs: &TransactionalTree,
        tx: &Transaction,
        tx_id: TxId,
        authenticated: &BTreeSet<Address>,
    ) -> Result<ExecutionReceipt, ConflictableTransactionError<TxError>> {
        let instruction = &tx.message.instruction;
        let mut loaded = Vec::with_capacity(instruction.accounts.len());
        for meta in &instruction.accounts {
            let record = match accounts.get(keys::account(&meta.address))? {
                Some(v) => Some(
                    codec::decode::<AccountRecord>(&v).map_err(|e| abort_store(e.to_string()))?,
                ),
                None => None,
            };
            loaded.push(LoadedAccount {
                address: meta.address,
                is_signer: meta.is_signer && authenticated.contains(&meta.address),
                is_writable: meta.is_writable,
                record,
            });
        }

        let now = self.clock.now_unix();
        let changes = process(&self.config, &loaded, &instruction.data, now)
            .map_err(|e| ConflictableTransactionError::Abort(TxError::Instruction(e)))?;

        let mut written = Vec::new();
        let mut closed = Vec::new();
        for change in changes {
            match change {
                AccountChange::Write { address, record } => {
                    let bytes = codec::encode(&record).map_err(|e| abort_store(e.to_string()))?;
                    accounts.insert(keys::account(&address), bytes)?;
                    written.push(address);
                }
                AccountChange::Close { address } => {
                    accounts.remove(keys::account(&address))?;
                    closed.push(address);
                }
            }
        }

        let slot = match txs.get(keys::slot())? {
            Some(v) => decode_u64(&v).map_err(abort_store)?,
            None => 0,
        }
        .saturating_add(1);
        txs.insert(keys::slot(), slot.to_be_bytes().to_vec())?;

        let receipt = ExecutionReceipt {
            schema_version: RECEIPT_SCHEMA_VERSION,
            tx_id,
            outcome: ApplyOutcome::Applied,
            slot,
            applied_at: now,
            written,
            closed,
        };
        let receipt_bytes = serde_json::to_vec(&receipt).map_err(|e| abort_store(e.to_string()))?;
        txs.insert(keys::receipt(&tx_id), receipt_bytes)?;
        txs.insert(keys::applied(&tx_id), b"1".to_vec())?;
        Ok(receipt)
    }

    /// Failures are kept for status queries but never mark the id applied,
    /// so the same transaction can still succeed later.
    fn record_failure(&self, tx_id: &TxId, error: &InstructionError) -> Result<(), ApplyError> {
        let bytes = serde_json::to_vec(error)
            .map_err(|e| ApplyError::Store(format!("failed encoding error json: {e}")))?;
        self.transactions
            .insert(keys::failure(tx_id), bytes)
            .map_err(|e| ApplyError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Successful application (fresh or replayed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub receipt: ExecutionReceipt,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Instruction(InstructionError),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("store error: {0}")]
    Store(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug)]
enum TxError {
    Instruction(InstructionError),
    Store(String),
}

fn abort_store(msg: String) -> ConflictableTransactionError<TxError> {
    ConflictableTransactionError::Abort(TxError::Store(msg))
}

fn instruction_name(data: &[u8]) -> &'static str {
    RegistryInstruction::unpack(data)
        .map(|ix| ix.name())
        .unwrap_or("unknown")
}

impl Substrate for Ledger {
    fn submit(&self, tx: &Transaction) -> Result<SubmitResult, SubstrateError> {
        let tx_id = tx.id()?;
        let name = instruction_name(&tx.message.instruction.data);
        match self.apply(tx) {
            Ok(Applied { receipt }) => {
                let already_known = receipt.outcome == ApplyOutcome::AlreadyApplied;
                info!(
                    event = "tx_applied",
                    tx_id = %tx_id,
                    instruction = name,
                    slot = receipt.slot,
                    applied_at = %format_unix(receipt.applied_at),
                    already_known
                );
                Ok(SubmitResult {
                    accepted: true,
                    already_known,
                    tx_id,
                    message: already_known.then(|| "already applied".to_string()),
                })
            }
            Err(ApplyError::Instruction(e)) => {
                info!(
                    event = "tx_failed",
                    tx_id = %tx_id,
                    instruction = name,
                    code = e.code(),
                    error = %e
                );
                Ok(SubmitResult {
                    accepted: true,
                    already_known: false,
                    tx_id,
                    message: Some(e.to_string()),
                })
            }
            Err(ApplyError::Rejected(s)) => {
                warn!(event = "tx_rejected", tx_id = %tx_id, reason = %s);
                Err(SubstrateError::Rejected(s))
            }
            Err(ApplyError::Codec(e)) => Err(SubstrateError::Codec(e)),
            Err(ApplyError::Store(s)) => {
                warn!(event = "ledger_store_error", tx_id = %tx_id, error = %s);
                Err(SubstrateError::Storage(s))
            }
        }
    }

    fn get_status(&self, tx_id: &TxId) -> Result<Option<TxStatus>, SubstrateError> {
        if let Some(receipt) = self.get_receipt(tx_id)? {
            return Ok(Some(TxStatus::Applied { receipt }));
        }
        let Some(v) = self
            .transactions
            .get(keys::failure(tx_id))
            .map_err(|e| SubstrateError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };
        let error: InstructionError = serde_json::from_slice(&v)
            .map_err(|e| SubstrateError::Storage(format!("failed decoding error json: {e}")))?;
        Ok(Some(TxStatus::Failed { error }))
    }

    fn read_account(&self, address: &Address) -> Result<Option<AccountRecord>, SubstrateError> {
        Ok(self.get_account(address)?)
    }
}

pub mod keys {
    use registry_core::{Address, TxId};

    pub fn account(address: &Address) -> Vec<u8> {
        format!("acct:{}", address.to_hex()).into_bytes()
    }

    pub fn applied(tx_id: &TxId) -> Vec<u8> {
        format!("applied:{}", hex::encode(tx_id.as_bytes())).into_bytes()
    }

    pub fn receipt(tx_id: &TxId) -> Vec<u8> {
        format!("receipt:{}", hex::encode(tx_id.as_bytes())).into_bytes()
    }

    pub fn failure(tx_id: &TxId) -> Vec<u8> {
        format!("failed:{}", hex::encode(tx_id.as_bytes())).into_bytes()
    }

    pub fn slot() -> &'static [u8] {
        b"slot"
    }
}

fn decode_u64(v: &[u8]) -> Result<u64, String> {
    let b: [u8; 8] = v
        .try_into()
        .map_err(|_| format!("expected 8 bytes for u64, got {}", v.len()))?;
    Ok(u64::from_be_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{self as build, CreateSubnetArgs};
    use registry_core::{Hash32, Keypair, ManualClock};

    fn ledger() -> Ledger {
        let config = ProgramConfig::new(Address([0xC0; 32]), Address([0x57; 32]));
        Ledger::temporary(config, Arc::new(ManualClock::new(1_000))).expect("ledger")
    }

    fn create_tx(governor: &Keypair, nonce: u64) -> Transaction {
        let built = build::create_subnet(
            &crate::REGISTRY_PROGRAM_ID,
            &governor.address(),
            CreateSubnetArgs {
                subnet_id: 1,
                max_neurons: 8,
                validator_limit: 2,
                emission_rate: 5,
                incentive_function_hash: Hash32::default(),
            },
        )
        .expect("build");
        Transaction::new_signed(built.instruction, nonce, &[governor]).expect("sign")
    }

    #[test]
    fn applied_tx_bumps_slot_and_stores_receipt() {
        let ledger = ledger();
        let governor = Keypair::from_seed([1; 32]);
        let tx = create_tx(&governor, 0);
        let res = ledger.submit(&tx).expect("submit");
        assert!(res.accepted && !res.already_known);
        assert_eq!(ledger.slot().expect("slot"), 1);

        let Some(TxStatus::Applied { receipt }) = ledger.get_status(&res.tx_id).expect("status")
        else {
            panic!("not applied")
        };
        assert_eq!(receipt.slot, 1);
        assert_eq!(receipt.applied_at, 1_000);
        assert_eq!(receipt.written.len(), 1);
    }

    #[test]
    fn replay_is_idempotent() {
        let ledger = ledger();
        let governor = Keypair::from_seed([1; 32]);
        let tx = create_tx(&governor, 0);
        ledger.submit(&tx).expect("first");
        let second = ledger.submit(&tx).expect("replay");
        assert!(second.already_known);
        assert_eq!(ledger.slot().expect("slot"), 1);

        let replayed = ledger.apply(&tx).expect("apply");
        assert_eq!(replayed.receipt.outcome, ApplyOutcome::AlreadyApplied);
    }

    #[test]
    fn failures_are_recorded_but_not_applied() {
        let ledger = ledger();
        let governor = Keypair::from_seed([1; 32]);
        ledger.submit(&create_tx(&governor, 0)).expect("create");

        // Same subnet id with a new nonce: distinct tx, fails on existence.
        let dup = create_tx(&governor, 1);
        let res = ledger.submit(&dup).expect("submit");
        assert!(res.message.as_deref().unwrap_or("").contains("already exists"));
        match ledger.get_status(&res.tx_id).expect("status") {
            Some(TxStatus::Failed { error }) => assert_eq!(error.code(), "subnet_already_exists"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ledger.slot().expect("slot"), 1);
    }

    #[test]
    fn forged_signature_reaches_program_unauthenticated() {
        let ledger = ledger();
        let governor = Keypair::from_seed([1; 32]);
        let mut tx = create_tx(&governor, 0);
        tx.signatures[0].signature = Keypair::from_seed([2; 32]).sign(b"other");
        let res = ledger.submit(&tx).expect("submit");
        match ledger.get_status(&res.tx_id).expect("status") {
            Some(TxStatus::Failed { error }) => assert_eq!(error.code(), "unauthenticated"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn foreign_program_is_rejected() {
        let ledger = ledger();
        let governor = Keypair::from_seed([1; 32]);
        let mut tx = create_tx(&governor, 0);
        tx.message.instruction.program_id = Address([0xEE; 32]);
        assert!(matches!(ledger.submit(&tx), Err(SubstrateError::Rejected(_))));
    }

    #[test]
    fn unknown_tx_has_no_status() {
        assert_eq!(ledger().get_status(&TxId([0; 32])).expect("status"), None);
    }
}
