use serde::Serialize;
use sponsor7702_primitives::alloy::primitives::{Address, TxHash, U256};
use sponsor7702_primitives::{DelegationDesignator, PrimitivesError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;

/// Protocol step an account flow was in when something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Step {
    Inspection,
    Revocation,
    Authorization,
    Signing,
    Simulation,
    Execution,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Inspection => "inspection",
            Self::Revocation => "revocation",
            Self::Authorization => "authorization",
            Self::Signing => "signing",
            Self::Simulation => "simulation",
            Self::Execution => "execution",
        };
        f.write_str(name)
    }
}

fn fmt_nonce(nonce: &Option<U256>) -> String {
    nonce.map_or_else(|| "n/a".to_string(), |nonce| nonce.to_string())
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map_or_else(String::new, |reason| format!(": {reason}"))
}

#[derive(Debug, Error)]
pub enum SponsorError {
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Delegation of {account} is {found} after {step}, expected {expected}")]
    StateMismatch {
        account: Address,
        step: Step,
        expected: DelegationDesignator,
        found: DelegationDesignator,
    },
    #[error("Batch signature rejected for {account} at batch nonce {nonce}, rebuild and re-sign")]
    SignatureRejected { account: Address, nonce: U256 },
    #[error("Call reverted for {account} at batch nonce {nonce}: {reason}")]
    CallReverted {
        account: Address,
        nonce: U256,
        reason: String,
    },
    #[error("Transaction {tx_hash} for {account} reverted during {step} (batch nonce {}){}", fmt_nonce(.nonce), fmt_reason(.reason))]
    TransactionReverted {
        account: Address,
        step: Step,
        nonce: Option<U256>,
        tx_hash: TxHash,
        /// Decoded from a replay of the batch, when the node still reproduces it.
        reason: Option<String>,
    },
    #[error("Network error for {account} during {step} (batch nonce {}): {reason}", fmt_nonce(.nonce))]
    NetworkError {
        account: Address,
        step: Step,
        nonce: Option<U256>,
        reason: String,
    },
    #[error("Timed out waiting for {tx_hash} ({account}, {step}, batch nonce {}); re-inspect before retrying", fmt_nonce(.nonce))]
    ConfirmationTimeout {
        account: Address,
        step: Step,
        nonce: Option<U256>,
        tx_hash: TxHash,
    },
    #[error("Insufficient funds for {account} during {step} (batch nonce {}): {reason}", fmt_nonce(.nonce))]
    InsufficientFunds {
        account: Address,
        step: Step,
        nonce: Option<U256>,
        reason: String,
    },
    #[error("Failed signing for {account} during {step}: {reason}")]
    SigningError {
        account: Address,
        step: Step,
        reason: String,
    },
    #[error("No running controller for {0}")]
    ControllerUnavailable(Address),
    #[error("Primitives error: {0}")]
    PrimitivesError(#[from] PrimitivesError),
}

impl SponsorError {
    /// Attaches flow context to a ledger failure.
    pub fn from_ledger(err: LedgerError, account: Address, step: Step, nonce: Option<U256>) -> Self {
        match err {
            LedgerError::InsufficientFunds(reason) => Self::InsufficientFunds {
                account,
                step,
                nonce,
                reason,
            },
            LedgerError::Transport(reason) | LedgerError::Rejected(reason) => Self::NetworkError {
                account,
                step,
                nonce,
                reason,
            },
        }
    }

    pub fn account(&self) -> Option<Address> {
        match self {
            Self::StateMismatch { account, .. }
            | Self::SignatureRejected { account, .. }
            | Self::CallReverted { account, .. }
            | Self::TransactionReverted { account, .. }
            | Self::NetworkError { account, .. }
            | Self::ConfirmationTimeout { account, .. }
            | Self::InsufficientFunds { account, .. }
            | Self::SigningError { account, .. } => Some(*account),
            Self::ControllerUnavailable(account) => Some(*account),
            Self::ConfigError(_) | Self::PrimitivesError(_) => None,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            Self::StateMismatch { step, .. }
            | Self::TransactionReverted { step, .. }
            | Self::NetworkError { step, .. }
            | Self::ConfirmationTimeout { step, .. }
            | Self::InsufficientFunds { step, .. }
            | Self::SigningError { step, .. } => Some(*step),
            Self::SignatureRejected { .. } | Self::CallReverted { .. } => Some(Step::Simulation),
            Self::ControllerUnavailable(_) | Self::ConfigError(_) | Self::PrimitivesError(_) => {
                None
            }
        }
    }

    /// The transaction may or may not have landed, or chain state moved under the
    /// plan. Read the account again before doing anything else.
    pub fn is_retryable_after_reinspection(&self) -> bool {
        matches!(
            self,
            Self::StateMismatch { .. }
                | Self::NetworkError { .. }
                | Self::ConfirmationTimeout { .. }
                | Self::TransactionReverted { .. }
        )
    }

    /// Nothing was sent, so retrying after fixing the cause is safe.
    pub fn mutated_nothing(&self) -> bool {
        matches!(
            self,
            Self::SignatureRejected { .. }
                | Self::CallReverted { .. }
                | Self::InsufficientFunds { .. }
                | Self::SigningError { .. }
                | Self::ConfigError(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, SponsorError>;
