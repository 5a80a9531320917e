//! Chain access used by the account flows.
//!
//! Everything the controller learns about an account or sends on its behalf goes through
//! [`Ledger`]. [`rpc::RpcLedger`] backs it with an alloy provider holding the sponsor
//! wallet.

use async_trait::async_trait;
use sponsor7702_primitives::alloy::eips::SignedAuthorization;
use sponsor7702_primitives::alloy::primitives::{Address, Bytes, TxHash, U256};
use sponsor7702_primitives::Call;
use std::time::Duration;
use thiserror::Error;

use crate::config::GasParams;

pub mod rpc;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("rejected by node: {0}")]
    Rejected(String),
}

pub type LedgerResult<T> = core::result::Result<T, LedgerError>;

/// Dry run of a batch against current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Simulation {
    Success,
    Reverted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Included { success: bool, gas_used: u128 },
    /// Nothing was observed in time. The transaction may still land.
    TimedOut,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address paying for every transaction this ledger sends.
    fn sponsor(&self) -> Address;

    async fn chain_id(&self) -> LedgerResult<u64>;

    async fn code(&self, account: Address) -> LedgerResult<Bytes>;

    /// Protocol nonce, the one authorizations are signed over.
    async fn transaction_count(&self, account: Address) -> LedgerResult<u64>;

    async fn balance(&self, account: Address) -> LedgerResult<U256>;

    /// Replay nonce held in the delegated account's storage.
    async fn batch_nonce(&self, account: Address) -> LedgerResult<U256>;

    async fn simulate_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
    ) -> LedgerResult<Simulation>;

    /// Sends the type-4 transaction carrying `authorization`, addressed to `account`
    /// with no value and empty calldata.
    async fn send_authorization(
        &self,
        account: Address,
        authorization: SignedAuthorization,
        gas: &GasParams,
    ) -> LedgerResult<TxHash>;

    async fn send_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
        gas: &GasParams,
    ) -> LedgerResult<TxHash>;

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> LedgerResult<Confirmation>;

    /// Replays a batch that reverted in `tx_hash` against the state it was mined in.
    /// `None` when the replay no longer reverts or yields no reason.
    async fn batch_revert_reason(
        &self,
        tx_hash: TxHash,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
    ) -> LedgerResult<Option<String>>;
}

/// Sorts a node error message into the ledger error kinds.
pub(crate) fn classify_node_message(message: String) -> LedgerError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") {
        LedgerError::InsufficientFunds(message)
    } else if lower.contains("nonce too low")
        || lower.contains("already known")
        || lower.contains("replacement transaction underpriced")
        || lower.contains("execution reverted")
    {
        LedgerError::Rejected(message)
    } else {
        LedgerError::Transport(message)
    }
}
