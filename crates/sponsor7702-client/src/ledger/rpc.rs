use alloy::contract::Error as ContractError;
use alloy::providers::{PendingTransactionError, WatchTxError};
use alloy::transports::TransportError;
use async_trait::async_trait;
use sponsor7702_primitives::abi::batch_call_and_sponsor::BatchCallAndSponsor::BatchCallAndSponsorInstance;
use sponsor7702_primitives::alloy::eips::{BlockId, SignedAuthorization};
use sponsor7702_primitives::alloy::network::{Ethereum, TransactionBuilder, TransactionBuilder7702};
use sponsor7702_primitives::alloy::primitives::{Address, Bytes, TxHash, U256};
use sponsor7702_primitives::alloy::providers::{PendingTransactionConfig, Provider};
use sponsor7702_primitives::alloy::rpc::TransactionRequest;
use sponsor7702_primitives::alloy::sol_types::decode_revert_reason;
use sponsor7702_primitives::alloy::transports::Transport;
use sponsor7702_primitives::Call;
use std::marker::PhantomData;
use std::time::Duration;

use super::{
    classify_node_message, Confirmation, Ledger, LedgerError, LedgerResult, Simulation,
};
use crate::config::GasParams;

/// [`Ledger`] over an alloy provider whose wallet holds the sponsor key.
#[derive(Clone)]
pub struct RpcLedger<T, P> {
    rpc_provider: P,
    sponsor: Address,
    phantom_data: PhantomData<T>,
}

impl<T, P> std::fmt::Debug for RpcLedger<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("sponsor", &self.sponsor)
            .finish_non_exhaustive()
    }
}

impl<T, P> RpcLedger<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + Clone,
{
    pub fn new(rpc_provider: P, sponsor: Address) -> Self {
        Self {
            rpc_provider,
            sponsor,
            phantom_data: PhantomData,
        }
    }

    fn batch_contract(&self, account: Address) -> BatchCallAndSponsorInstance<T, P, Ethereum> {
        BatchCallAndSponsorInstance::new(account, self.rpc_provider.clone())
    }
}

fn rpc_error(err: TransportError) -> LedgerError {
    match err.as_error_resp() {
        Some(payload) => classify_node_message(payload.message.to_string()),
        None => LedgerError::Transport(err.to_string()),
    }
}

fn contract_error(err: ContractError) -> LedgerError {
    match err {
        ContractError::TransportError(err) => rpc_error(err),
        other => LedgerError::Transport(other.to_string()),
    }
}

/// A revert during `eth_call` is a simulation result, anything else is a failure.
fn simulation_from_error(err: ContractError) -> LedgerResult<Simulation> {
    let ContractError::TransportError(err) = err else {
        return Err(LedgerError::Transport(err.to_string()));
    };
    let Some(payload) = err.as_error_resp() else {
        return Err(LedgerError::Transport(err.to_string()));
    };

    if let Some(reason) = payload
        .as_revert_data()
        .and_then(|data| decode_revert_reason(&data))
    {
        return Ok(Simulation::Reverted { reason });
    }

    let message = payload.message.to_string();
    if message.to_lowercase().contains("revert") {
        Ok(Simulation::Reverted { reason: message })
    } else {
        Err(classify_node_message(message))
    }
}

/// The watcher giving up is a timeout, a failing node is not.
fn watch_error(err: PendingTransactionError) -> LedgerResult<Confirmation> {
    match err {
        PendingTransactionError::TxWatcher(WatchTxError::Timeout) => Ok(Confirmation::TimedOut),
        PendingTransactionError::TransportError(err) => Err(rpc_error(err)),
        other => Err(LedgerError::Transport(other.to_string())),
    }
}

#[async_trait]
impl<T, P> Ledger for RpcLedger<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + Clone,
{
    fn sponsor(&self) -> Address {
        self.sponsor
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        self.rpc_provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn code(&self, account: Address) -> LedgerResult<Bytes> {
        self.rpc_provider
            .get_code_at(account)
            .await
            .map_err(rpc_error)
    }

    async fn transaction_count(&self, account: Address) -> LedgerResult<u64> {
        self.rpc_provider
            .get_transaction_count(account)
            .await
            .map_err(rpc_error)
    }

    async fn balance(&self, account: Address) -> LedgerResult<U256> {
        self.rpc_provider
            .get_balance(account)
            .await
            .map_err(rpc_error)
    }

    async fn batch_nonce(&self, account: Address) -> LedgerResult<U256> {
        let nonce = self
            .batch_contract(account)
            .nonce()
            .call()
            .await
            .map_err(contract_error)?;
        Ok(nonce._0)
    }

    async fn simulate_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
    ) -> LedgerResult<Simulation> {
        match self
            .batch_contract(account)
            .execute(calls.to_vec(), signature.clone())
            .from(self.sponsor)
            .call()
            .await
        {
            Ok(_) => Ok(Simulation::Success),
            Err(err) => simulation_from_error(err),
        }
    }

    async fn send_authorization(
        &self,
        account: Address,
        authorization: SignedAuthorization,
        gas: &GasParams,
    ) -> LedgerResult<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(self.sponsor)
            .with_to(account)
            .with_value(U256::ZERO)
            .with_input(Bytes::new())
            .with_authorization_list(vec![authorization])
            .with_gas_limit(gas.authorization_gas_limit)
            .with_max_fee_per_gas(gas.max_fee_per_gas)
            .with_max_priority_fee_per_gas(gas.max_priority_fee_per_gas);

        let pending = self
            .rpc_provider
            .send_transaction(tx)
            .await
            .map_err(rpc_error)?;

        tracing::debug!("authorization for {} sent in {}", account, pending.tx_hash());
        Ok(*pending.tx_hash())
    }

    async fn send_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
        gas: &GasParams,
    ) -> LedgerResult<TxHash> {
        let pending = self
            .batch_contract(account)
            .execute(calls.to_vec(), signature.clone())
            .from(self.sponsor)
            .max_fee_per_gas(gas.max_fee_per_gas)
            .max_priority_fee_per_gas(gas.max_priority_fee_per_gas)
            .send()
            .await
            .map_err(contract_error)?;

        tracing::debug!("batch for {} sent in {}", account, pending.tx_hash());
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> LedgerResult<Confirmation> {
        let config = PendingTransactionConfig::new(tx_hash).with_timeout(Some(timeout));
        let watched = match self.rpc_provider.watch_pending_transaction(config).await {
            Ok(pending) => pending.await,
            Err(e) => Err(e),
        };
        if let Err(e) = watched {
            return watch_error(e);
        }

        let Some(receipt) = self
            .rpc_provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(rpc_error)?
        else {
            // mined then dropped, the caller re-inspects like after a timeout
            tracing::warn!("receipt for {} disappeared after inclusion", tx_hash);
            return Ok(Confirmation::TimedOut);
        };

        Ok(Confirmation::Included {
            success: receipt.status(),
            gas_used: u128::from(receipt.gas_used),
        })
    }

    async fn batch_revert_reason(
        &self,
        tx_hash: TxHash,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
    ) -> LedgerResult<Option<String>> {
        let block = self
            .rpc_provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(rpc_error)?
            .and_then(|receipt| receipt.block_number);

        let contract = self.batch_contract(account);
        let mut replay = contract
            .execute(calls.to_vec(), signature.clone())
            .from(self.sponsor);
        if let Some(block) = block {
            replay = replay.block(BlockId::number(block));
        }

        match replay.call().await {
            Ok(_) => Ok(None),
            Err(err) => match simulation_from_error(err)? {
                Simulation::Reverted { reason } => Ok(Some(reason)),
                Simulation::Success => Ok(None),
            },
        }
    }
}
