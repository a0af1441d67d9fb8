#![forbid(unsafe_code)]

use registry_core::{ErrorKind, InstructionError, SubstrateError, TransactionError, TxId};
use registry_program::BuildError;

/// What a caller may assume about the ledger after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The instruction did not change any state.
    NotApplied,
    /// The instruction may or may not have been applied.
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected by the program, or by the same checks run before submission.
    #[error(transparent)]
    Instruction(#[from] InstructionError),
    #[error("failed to build instruction: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Substrate(#[from] SubstrateError),
    #[error("no confirmation for tx {tx_id} after {polls} polls; outcome unknown")]
    ConfirmationTimeout { tx_id: TxId, polls: u32 },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Instruction(e) => e.kind(),
            ClientError::Build(_) => ErrorKind::Encoding,
            ClientError::Transaction(TransactionError::MissingSigner(_)) => {
                ErrorKind::Authorization
            }
            ClientError::Transaction(TransactionError::Codec(_)) => ErrorKind::Encoding,
            ClientError::Substrate(_) | ClientError::ConfirmationTimeout { .. } => {
                ErrorKind::Substrate
            }
        }
    }

    /// Deterministic failures never succeed when resubmitted as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Substrate(e) => !matches!(
                e,
                SubstrateError::Rejected(_) | SubstrateError::Codec(_)
            ),
            ClientError::ConfirmationTimeout { .. } => true,
            _ => false,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            ClientError::ConfirmationTimeout { .. } => Outcome::Unknown,
            ClientError::Substrate(_) if self.is_retryable() => Outcome::Unknown,
            _ => Outcome::NotApplied,
        }
    }

    /// Stable machine-readable code for CLI output and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Instruction(e) => e.code(),
            ClientError::Build(_) => "build_error",
            ClientError::Transaction(TransactionError::MissingSigner(_)) => "missing_signer",
            ClientError::Transaction(TransactionError::Codec(e)) => e.code(),
            ClientError::Substrate(SubstrateError::Unavailable(_)) => "substrate_unavailable",
            ClientError::Substrate(SubstrateError::Rejected(_)) => "substrate_rejected",
            ClientError::Substrate(SubstrateError::Storage(_)) => "substrate_storage",
            ClientError::Substrate(SubstrateError::Codec(e)) => e.code(),
            ClientError::ConfirmationTimeout { .. } => "confirmation_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::Address;

    #[test]
    fn program_failures_are_final() {
        let e = ClientError::from(InstructionError::SubnetNotFound { subnet_id: 9 });
        assert_eq!(e.kind(), ErrorKind::NotFound);
        assert!(!e.is_retryable());
        assert_eq!(e.outcome(), Outcome::NotApplied);
        assert_eq!(e.code(), "subnet_not_found");
    }

    #[test]
    fn timeout_is_ambiguous_and_retryable() {
        let e = ClientError::ConfirmationTimeout {
            tx_id: TxId([1; 32]),
            polls: 3,
        };
        assert_eq!(e.kind(), ErrorKind::Substrate);
        assert!(e.is_retryable());
        assert_eq!(e.outcome(), Outcome::Unknown);
        assert!(e.to_string().contains("after 3 polls"));
    }

    #[test]
    fn substrate_errors_split_on_transience() {
        let busy = ClientError::from(SubstrateError::Unavailable("busy".into()));
        assert!(busy.is_retryable());
        assert_eq!(busy.outcome(), Outcome::Unknown);

        let rejected = ClientError::from(SubstrateError::Rejected("bad signature".into()));
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.outcome(), Outcome::NotApplied);
        assert_eq!(rejected.kind(), ErrorKind::Substrate);
    }

    #[test]
    fn missing_signer_is_authorization() {
        let e = ClientError::from(TransactionError::MissingSigner(Address([2; 32])));
        assert_eq!(e.kind(), ErrorKind::Authorization);
        assert_eq!(e.code(), "missing_signer");
    }
}
