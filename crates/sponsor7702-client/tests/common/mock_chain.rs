use async_trait::async_trait;
use sponsor7702_client::config::GasParams;
use sponsor7702_client::ledger::{Confirmation, Ledger, LedgerError, LedgerResult, Simulation};
use sponsor7702_primitives::abi::erc20::MockERC20;
use sponsor7702_primitives::abi::tier_stake::TierStake;
use sponsor7702_primitives::alloy::eips::SignedAuthorization;
use sponsor7702_primitives::alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use sponsor7702_primitives::alloy::sol_types::SolCall;
use sponsor7702_primitives::contract::{
    BatchAccount, BatchExecutionError, BatchState, CALL_REVERTED_REASON, INVALID_SIGNATURE_REASON,
};
use sponsor7702_primitives::delegation::designator_code;
use sponsor7702_primitives::{Call, DelegationDesignator, SignatureScheme};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const CHAIN_ID: u64 = 31337;
pub const AUTHORIZATION_GAS: u128 = 46_000;
pub const BATCH_GAS: u128 = 90_000;

/// Native balances plus the token and staking contracts the batches talk to.
#[derive(Debug, Clone, Default)]
pub struct World {
    pub token: Address,
    pub stake: Address,
    pub native: HashMap<Address, U256>,
    pub tokens: HashMap<Address, U256>,
    pub allowances: HashMap<(Address, Address), U256>,
    pub stakes: HashMap<Address, U256>,
}

impl World {
    fn token_balance(&self, owner: Address) -> U256 {
        self.tokens.get(&owner).copied().unwrap_or_default()
    }

    fn move_tokens(&mut self, from: Address, to: Address, amount: U256) -> Result<(), String> {
        let balance = self.token_balance(from);
        if balance < amount {
            return Err(format!("ERC20InsufficientBalance({from}, {balance}, {amount})"));
        }
        self.tokens.insert(from, balance - amount);
        let to_balance = self.token_balance(to);
        self.tokens.insert(to, to_balance + amount);
        Ok(())
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, amount: U256) -> Result<(), String> {
        let allowance = self
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(format!("ERC20InsufficientAllowance({spender}, {allowance}, {amount})"));
        }
        self.allowances.insert((owner, spender), allowance - amount);
        Ok(())
    }

    fn apply_token_call(&mut self, sender: Address, data: &[u8]) -> Result<(), String> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or("missing selector")?;

        if selector == MockERC20::mintCall::SELECTOR {
            let call = MockERC20::mintCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            let balance = self.token_balance(call.to);
            self.tokens.insert(call.to, balance + call.amount);
            Ok(())
        } else if selector == MockERC20::transferCall::SELECTOR {
            let call = MockERC20::transferCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            self.move_tokens(sender, call.to, call.amount)
        } else if selector == MockERC20::approveCall::SELECTOR {
            let call = MockERC20::approveCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            self.allowances.insert((sender, call.spender), call.amount);
            Ok(())
        } else if selector == MockERC20::transferFromCall::SELECTOR {
            let call =
                MockERC20::transferFromCall::abi_decode(data, true).map_err(|e| e.to_string())?;
            self.spend_allowance(call.from, sender, call.amount)?;
            self.move_tokens(call.from, call.to, call.amount)
        } else {
            Err("unknown token function".into())
        }
    }

    fn apply_stake_call(&mut self, sender: Address, data: &[u8]) -> Result<(), String> {
        let call = TierStake::stakeCall::abi_decode(data, true).map_err(|e| e.to_string())?;
        if call.amount.is_zero() {
            return Err("Amount must be greater than 0".into());
        }
        self.spend_allowance(sender, self.stake, call.amount)?;
        self.move_tokens(sender, self.stake, call.amount)?;
        let staked = self.stakes.get(&sender).copied().unwrap_or_default();
        self.stakes.insert(sender, staked + call.amount);
        Ok(())
    }
}

impl BatchState for World {
    fn apply(&mut self, sender: Address, call: &Call) -> Result<(), String> {
        if !call.value.is_zero() {
            let balance = self.native.get(&sender).copied().unwrap_or_default();
            if balance < call.value {
                return Err("insufficient balance for value transfer".into());
            }
            self.native.insert(sender, balance - call.value);
            let to_balance = self.native.get(&call.to).copied().unwrap_or_default();
            self.native.insert(call.to, to_balance + call.value);
        }

        if call.data.is_empty() {
            Ok(())
        } else if call.to == self.token {
            self.apply_token_call(sender, &call.data)
        } else if call.to == self.stake {
            self.apply_stake_call(sender, &call.data)
        } else {
            Err(format!("no contract at {}", call.to))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentTx {
    Authorization {
        account: Address,
        target: Address,
        hash: TxHash,
    },
    Batch {
        account: Address,
        calls: usize,
        hash: TxHash,
    },
}

#[derive(Debug, Default)]
struct Faults {
    time_out_next_receipt: bool,
    drop_next_authorization: bool,
    revert_next_batch: bool,
    fail_next_code_read: bool,
}

#[derive(Debug, Default)]
struct ChainState {
    world: World,
    code: HashMap<Address, Bytes>,
    tx_counts: HashMap<Address, u64>,
    // storage outlives the designator, so a re-delegated account resumes its nonce
    batch_nonces: HashMap<Address, U256>,
    receipts: HashMap<TxHash, Confirmation>,
    revert_reasons: HashMap<TxHash, String>,
    sent: Vec<SentTx>,
    faults: Faults,
    tx_index: u64,
}

impl ChainState {
    fn next_hash(&mut self) -> TxHash {
        self.tx_index += 1;
        keccak256(self.tx_index.to_be_bytes())
    }

    fn designator(&self, account: Address) -> DelegationDesignator {
        DelegationDesignator::from_code(self.code.get(&account).map_or(&[][..], |code| &code[..]))
    }

    fn charge(&mut self, payer: Address, gas_used: u128, gas: &GasParams) -> LedgerResult<()> {
        let cost = U256::from(gas_used) * U256::from(gas.max_fee_per_gas);
        let balance = self.world.native.get(&payer).copied().unwrap_or_default();
        if balance < cost {
            return Err(LedgerError::InsufficientFunds(format!(
                "insufficient funds for gas * price + value: have {balance} want {cost}"
            )));
        }
        self.world.native.insert(payer, balance - cost);
        *self.tx_counts.entry(payer).or_default() += 1;
        Ok(())
    }

    fn record_receipt(&mut self, hash: TxHash, success: bool, gas_used: u128) {
        let confirmation = if std::mem::take(&mut self.faults.time_out_next_receipt) {
            Confirmation::TimedOut
        } else {
            Confirmation::Included { success, gas_used }
        };
        self.receipts.insert(hash, confirmation);
    }

    /// Applies a 7702 authorization the way a node does: invalid tuples are skipped,
    /// the transaction itself still succeeds.
    fn apply_authorization(&mut self, authorization: &SignedAuthorization) {
        let Ok(authority) = authorization.recover_authority() else {
            return;
        };
        let chain_id = authorization.chain_id;
        if chain_id != 0 && chain_id != CHAIN_ID {
            return;
        }
        let nonce = self.tx_counts.get(&authority).copied().unwrap_or_default();
        if authorization.nonce != nonce {
            return;
        }
        // only plain or already delegated accounts may delegate
        if matches!(self.designator(authority), DelegationDesignator::Unknown(_)) {
            return;
        }

        if authorization.address.is_zero() {
            self.code.remove(&authority);
        } else {
            self.code
                .insert(authority, designator_code(authorization.address));
        }
        self.tx_counts.insert(authority, nonce + 1);
    }
}

/// In-memory chain with EIP-7702 code designation and the batch contract model.
pub struct MockChain {
    sponsor: Address,
    batch_contract: Address,
    scheme: SignatureScheme,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(sponsor: Address, batch_contract: Address, token: Address, stake: Address) -> Self {
        let state = ChainState {
            world: World {
                token,
                stake,
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            sponsor,
            batch_contract,
            scheme: SignatureScheme::PersonalMessage,
            state: Mutex::new(state),
        }
    }

    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn fund(&self, owner: Address, amount: U256) {
        self.lock().world.native.insert(owner, amount);
    }

    pub fn mint_tokens(&self, owner: Address, amount: U256) {
        let mut state = self.lock();
        let balance = state.world.token_balance(owner);
        state.world.tokens.insert(owner, balance + amount);
    }

    pub fn set_code(&self, account: Address, code: Bytes) {
        self.lock().code.insert(account, code);
    }

    pub fn designator_of(&self, account: Address) -> DelegationDesignator {
        self.lock().designator(account)
    }

    pub fn token_balance(&self, owner: Address) -> U256 {
        self.lock().world.token_balance(owner)
    }

    pub fn native_balance(&self, owner: Address) -> U256 {
        self.lock().world.native.get(&owner).copied().unwrap_or_default()
    }

    pub fn staked(&self, owner: Address) -> U256 {
        self.lock().world.stakes.get(&owner).copied().unwrap_or_default()
    }

    pub fn stored_batch_nonce(&self, account: Address) -> U256 {
        self.lock()
            .batch_nonces
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.lock().sent.clone()
    }

    pub fn authorizations_sent(&self) -> Vec<Address> {
        self.sent()
            .into_iter()
            .filter_map(|tx| match tx {
                SentTx::Authorization { target, .. } => Some(target),
                SentTx::Batch { .. } => None,
            })
            .collect()
    }

    pub fn batches_sent(&self) -> usize {
        self.sent()
            .iter()
            .filter(|tx| matches!(tx, SentTx::Batch { .. }))
            .count()
    }

    pub fn time_out_next_receipt(&self) {
        self.lock().faults.time_out_next_receipt = true;
    }

    pub fn drop_next_authorization(&self) {
        self.lock().faults.drop_next_authorization = true;
    }

    pub fn revert_next_batch(&self) {
        self.lock().faults.revert_next_batch = true;
    }

    pub fn fail_next_code_read(&self) {
        self.lock().faults.fail_next_code_read = true;
    }

    fn account_model(&self, state: &ChainState, account: Address) -> BatchAccount<World> {
        let nonce = state.batch_nonces.get(&account).copied().unwrap_or_default();
        BatchAccount::new(account, state.world.clone())
            .with_scheme(self.scheme)
            .at_nonce(nonce)
    }
}

fn revert_reason(err: &BatchExecutionError) -> String {
    match err {
        BatchExecutionError::InvalidSignature => INVALID_SIGNATURE_REASON.to_string(),
        BatchExecutionError::CallReverted { .. } => CALL_REVERTED_REASON.to_string(),
    }
}

#[async_trait]
impl Ledger for MockChain {
    fn sponsor(&self) -> Address {
        self.sponsor
    }

    async fn chain_id(&self) -> LedgerResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn code(&self, account: Address) -> LedgerResult<Bytes> {
        let mut state = self.lock();
        if std::mem::take(&mut state.faults.fail_next_code_read) {
            return Err(LedgerError::Transport("connection reset by peer".into()));
        }
        Ok(state.code.get(&account).cloned().unwrap_or_default())
    }

    async fn transaction_count(&self, account: Address) -> LedgerResult<u64> {
        Ok(self.lock().tx_counts.get(&account).copied().unwrap_or_default())
    }

    async fn balance(&self, account: Address) -> LedgerResult<U256> {
        Ok(self.native_balance(account))
    }

    async fn batch_nonce(&self, account: Address) -> LedgerResult<U256> {
        let state = self.lock();
        if !state.designator(account).targets(self.batch_contract) {
            return Err(LedgerError::Rejected(format!("no batch contract code at {account}")));
        }
        Ok(state.batch_nonces.get(&account).copied().unwrap_or_default())
    }

    async fn simulate_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
    ) -> LedgerResult<Simulation> {
        let state = self.lock();
        if !state.designator(account).targets(self.batch_contract) {
            return Ok(Simulation::Success);
        }
        match self.account_model(&state, account).simulate(calls, signature) {
            Ok(_) => Ok(Simulation::Success),
            Err(err) => Ok(Simulation::Reverted {
                reason: revert_reason(&err),
            }),
        }
    }

    async fn send_authorization(
        &self,
        account: Address,
        authorization: SignedAuthorization,
        gas: &GasParams,
    ) -> LedgerResult<TxHash> {
        let mut state = self.lock();
        state.charge(self.sponsor, AUTHORIZATION_GAS, gas)?;

        let hash = state.next_hash();
        if !std::mem::take(&mut state.faults.drop_next_authorization) {
            state.apply_authorization(&authorization);
        }
        state.sent.push(SentTx::Authorization {
            account,
            target: authorization.address,
            hash,
        });
        state.record_receipt(hash, true, AUTHORIZATION_GAS);
        Ok(hash)
    }

    async fn send_batch(
        &self,
        account: Address,
        calls: &[Call],
        signature: &Bytes,
        gas: &GasParams,
    ) -> LedgerResult<TxHash> {
        let mut state = self.lock();
        state.charge(self.sponsor, BATCH_GAS, gas)?;

        let hash = state.next_hash();
        state.sent.push(SentTx::Batch {
            account,
            calls: calls.len(),
            hash,
        });

        let forced_revert = std::mem::take(&mut state.faults.revert_next_batch);
        let success = if forced_revert {
            state
                .revert_reasons
                .insert(hash, format!("revert: {CALL_REVERTED_REASON}"));
            false
        } else if state.designator(account).targets(self.batch_contract) {
            let mut model = self.account_model(&state, account);
            match model.execute(calls, signature) {
                Ok(_) => {
                    state.batch_nonces.insert(account, model.nonce());
                    state.world = model.into_state();
                    true
                }
                Err(err) => {
                    state
                        .revert_reasons
                        .insert(hash, format!("revert: {}", revert_reason(&err)));
                    false
                }
            }
        } else {
            // a call into a plain account runs no code
            true
        };

        state.record_receipt(hash, success, BATCH_GAS);
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _timeout: Duration,
    ) -> LedgerResult<Confirmation> {
        Ok(self
            .lock()
            .receipts
            .get(&tx_hash)
            .copied()
            .unwrap_or(Confirmation::TimedOut))
    }

    async fn batch_revert_reason(
        &self,
        tx_hash: TxHash,
        _account: Address,
        _calls: &[Call],
        _signature: &Bytes,
    ) -> LedgerResult<Option<String>> {
        Ok(self.lock().revert_reasons.get(&tx_hash).cloned())
    }
}
