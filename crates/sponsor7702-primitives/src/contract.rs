//! Verification rules of the batch contract, reproduced off-chain.
//!
//! Code running at a delegated account recomputes the digest from its *current*
//! nonce, recovers the signer and requires it to be the account itself. Calls then run
//! in order and any failure rolls back the whole batch without touching the nonce.
//! [`BatchAccount`] applies exactly these rules to an arbitrary state so the
//! orchestration can be checked against them without a node.

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

use crate::encoding::batch_digest;
use crate::{Call, SignatureScheme};

/// Revert string of the contract when the recovered signer is not the account.
pub const INVALID_SIGNATURE_REASON: &str = "Invalid signature";
/// Revert string of the contract when an inner call fails.
pub const CALL_REVERTED_REASON: &str = "Call reverted";

/// Coarse reading of a revert reason reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertKind {
    InvalidSignature,
    CallReverted,
    InsufficientFunds,
    Other,
}

impl RevertKind {
    pub fn classify(reason: &str) -> Self {
        let lower = reason.to_lowercase();
        if lower.contains(&INVALID_SIGNATURE_REASON.to_lowercase()) {
            Self::InvalidSignature
        } else if lower.contains(&CALL_REVERTED_REASON.to_lowercase()) {
            Self::CallReverted
        } else if lower.contains("insufficient funds") {
            Self::InsufficientFunds
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchExecutionError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Call reverted: call {index} failed: {reason}")]
    CallReverted { index: usize, reason: String },
}

/// State the calls of a batch act upon.
///
/// `apply` runs one call on behalf of `sender`. Returning an error reverts the whole
/// batch, so implementations may leave `self` half-updated on failure.
pub trait BatchState: Clone {
    fn apply(&mut self, sender: Address, call: &Call) -> Result<(), String>;
}

/// A delegated account running the batch contract over state `S`.
#[derive(Debug, Clone)]
pub struct BatchAccount<S> {
    address: Address,
    nonce: U256,
    scheme: SignatureScheme,
    state: S,
}

impl<S: BatchState> BatchAccount<S> {
    /// Nonce starts at zero.
    pub fn new(address: Address, state: S) -> Self {
        Self {
            address,
            nonce: U256::ZERO,
            scheme: SignatureScheme::default(),
            state,
        }
    }

    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Resumes from a nonce already in the account's storage.
    pub fn at_nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn into_state(self) -> S {
        self.state
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Checks `signature` against the digest of `calls` at the current nonce and
    /// returns that digest.
    pub fn verify(&self, calls: &[Call], signature: &[u8]) -> Result<B256, BatchExecutionError> {
        let digest = batch_digest(self.nonce, calls);
        match self.scheme.recover_from_bytes(digest, signature) {
            Ok(recovered) if recovered == self.address => Ok(digest),
            _ => Err(BatchExecutionError::InvalidSignature),
        }
    }

    /// Verifies and executes the batch atomically. Returns the nonce the batch
    /// consumed; the stored nonce is then one higher.
    pub fn execute(&mut self, calls: &[Call], signature: &[u8]) -> Result<U256, BatchExecutionError> {
        self.verify(calls, signature)?;

        let mut staged = self.state.clone();
        for (index, call) in calls.iter().enumerate() {
            staged
                .apply(self.address, call)
                .map_err(|reason| BatchExecutionError::CallReverted { index, reason })?;
        }

        let consumed = self.nonce;
        self.state = staged;
        self.nonce += U256::from(1);
        Ok(consumed)
    }

    /// Runs [`Self::execute`] against a copy, leaving `self` untouched.
    pub fn simulate(&self, calls: &[Call], signature: &[u8]) -> Result<U256, BatchExecutionError> {
        self.clone().execute(calls, signature)
    }
}
