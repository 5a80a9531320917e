//! Sponsor-side submission and confirmation of account transactions.

use serde::Serialize;
use sponsor7702_primitives::alloy::eips::SignedAuthorization;
use sponsor7702_primitives::alloy::primitives::{Address, Bytes, TxHash, U256};
use sponsor7702_primitives::contract::RevertKind;
use sponsor7702_primitives::BatchRequest;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GasParams;
use crate::error::{Result, SponsorError, Step};
use crate::events::{EventBus, FlowEventKind};
use crate::ledger::{Confirmation, Ledger, LedgerError, Simulation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntentKind {
    Authorization,
    Revocation,
    BatchExecution,
}

/// `Built -> Submitted -> Confirmed | Reverted | TimedOut`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxState {
    Built,
    Submitted,
    Confirmed,
    Reverted,
    TimedOut,
}

impl TxState {
    pub fn can_transition_to(self, next: TxState) -> bool {
        matches!(
            (self, next),
            (Self::Built, Self::Submitted)
                | (Self::Submitted, Self::Confirmed)
                | (Self::Submitted, Self::Reverted)
                | (Self::Submitted, Self::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted | Self::TimedOut)
    }
}

#[derive(Debug, Clone)]
pub enum IntentPayload {
    Authorization(SignedAuthorization),
    Batch {
        request: BatchRequest,
        signature: Bytes,
    },
}

/// One transaction the sponsor sends for an account, tracked until it settles.
#[derive(Debug, Clone)]
pub struct TransactionIntent {
    pub kind: IntentKind,
    pub account: Address,
    pub payload: IntentPayload,
    pub gas: GasParams,
    state: TxState,
    tx_hash: Option<TxHash>,
}

impl TransactionIntent {
    /// Revocation when the authorization points at the zero address.
    pub fn authorization(
        account: Address,
        authorization: SignedAuthorization,
        gas: GasParams,
    ) -> Self {
        let kind = if authorization.address.is_zero() {
            IntentKind::Revocation
        } else {
            IntentKind::Authorization
        };
        Self {
            kind,
            account,
            payload: IntentPayload::Authorization(authorization),
            gas,
            state: TxState::Built,
            tx_hash: None,
        }
    }

    pub fn batch(account: Address, request: BatchRequest, signature: Bytes, gas: GasParams) -> Self {
        Self {
            kind: IntentKind::BatchExecution,
            account,
            payload: IntentPayload::Batch { request, signature },
            gas,
            state: TxState::Built,
            tx_hash: None,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    pub fn step(&self) -> Step {
        match self.kind {
            IntentKind::Authorization => Step::Authorization,
            IntentKind::Revocation => Step::Revocation,
            IntentKind::BatchExecution => Step::Execution,
        }
    }

    /// Batch nonce the intent is bound to, if it carries a batch.
    pub fn nonce(&self) -> Option<U256> {
        match &self.payload {
            IntentPayload::Batch { request, .. } => Some(request.nonce),
            IntentPayload::Authorization(_) => None,
        }
    }

    fn advance(&mut self, next: TxState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid intent transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub gas_used: u128,
}

pub struct RelayerExecutor<L> {
    ledger: Arc<L>,
    gas: GasParams,
    confirmation_timeout: Duration,
    events: EventBus,
}

impl<L> std::fmt::Debug for RelayerExecutor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerExecutor")
            .field("gas", &self.gas)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

impl<L: Ledger> RelayerExecutor<L> {
    pub fn new(
        ledger: Arc<L>,
        gas: GasParams,
        confirmation_timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            ledger,
            gas,
            confirmation_timeout,
            events,
        }
    }

    pub fn gas(&self) -> &GasParams {
        &self.gas
    }

    pub fn authorization_intent(
        &self,
        account: Address,
        authorization: SignedAuthorization,
    ) -> TransactionIntent {
        let intent = TransactionIntent::authorization(account, authorization, self.gas.clone());
        self.publish(&intent);
        intent
    }

    pub fn batch_intent(
        &self,
        account: Address,
        request: BatchRequest,
        signature: Bytes,
    ) -> TransactionIntent {
        let intent = TransactionIntent::batch(account, request, signature, self.gas.clone());
        self.publish(&intent);
        intent
    }

    fn publish(&self, intent: &TransactionIntent) {
        self.events.emit(
            intent.account,
            FlowEventKind::Transaction {
                kind: intent.kind,
                state: intent.state,
                tx_hash: intent.tx_hash,
            },
        );
    }

    fn ledger_error(
        &self,
        intent: &TransactionIntent,
        step: Step,
    ) -> impl Fn(LedgerError) -> SponsorError {
        let account = intent.account;
        let nonce = intent.nonce();
        move |e| SponsorError::from_ledger(e, account, step, nonce)
    }

    /// Runs the pre-flight checks and sends the intent without waiting for it.
    /// Nothing is sent when a check fails.
    pub async fn dispatch(&self, intent: &mut TransactionIntent) -> Result<TxHash> {
        let step = intent.step();
        let tx_hash = match &intent.payload {
            IntentPayload::Authorization(authorization) => {
                let sponsor = self.ledger.sponsor();
                let balance = self
                    .ledger
                    .balance(sponsor)
                    .await
                    .map_err(self.ledger_error(intent, step))?;
                let required = intent.gas.authorization_cost();
                if balance < required {
                    return Err(SponsorError::InsufficientFunds {
                        account: intent.account,
                        step,
                        nonce: None,
                        reason: format!("sponsor {sponsor} holds {balance} wei, needs {required}"),
                    });
                }

                self.ledger
                    .send_authorization(intent.account, authorization.clone(), &intent.gas)
                    .await
                    .map_err(self.ledger_error(intent, step))?
            }
            IntentPayload::Batch { request, signature } => {
                let balance = self
                    .ledger
                    .balance(intent.account)
                    .await
                    .map_err(self.ledger_error(intent, Step::Simulation))?;
                let required = request.total_value();
                if balance < required {
                    return Err(SponsorError::InsufficientFunds {
                        account: intent.account,
                        step: Step::Simulation,
                        nonce: Some(request.nonce),
                        reason: format!("calls forward {required} wei, account holds {balance}"),
                    });
                }

                let simulation = self
                    .ledger
                    .simulate_batch(intent.account, &request.calls, signature)
                    .await
                    .map_err(self.ledger_error(intent, Step::Simulation))?;
                if let Simulation::Reverted { reason } = simulation {
                    return Err(simulation_error(intent.account, request.nonce, reason));
                }

                self.ledger
                    .send_batch(intent.account, &request.calls, signature, &intent.gas)
                    .await
                    .map_err(self.ledger_error(intent, step))?
            }
        };

        intent.tx_hash = Some(tx_hash);
        intent.advance(TxState::Submitted);
        self.publish(intent);
        Ok(tx_hash)
    }

    /// Blocks until the submitted intent is mined or the confirmation timeout passes.
    pub async fn confirm(&self, intent: &mut TransactionIntent) -> Result<TxOutcome> {
        let step = intent.step();
        let Some(tx_hash) = intent.tx_hash else {
            return Err(SponsorError::NetworkError {
                account: intent.account,
                step,
                nonce: intent.nonce(),
                reason: "intent was never submitted".into(),
            });
        };

        let confirmation = self
            .ledger
            .wait_for_receipt(tx_hash, self.confirmation_timeout)
            .await
            .map_err(self.ledger_error(intent, step))?;

        let result = match confirmation {
            Confirmation::Included {
                success: true,
                gas_used,
            } => {
                intent.advance(TxState::Confirmed);
                Ok(TxOutcome { tx_hash, gas_used })
            }
            Confirmation::Included { success: false, .. } => {
                intent.advance(TxState::Reverted);
                let reason = self.revert_reason(intent, tx_hash).await;
                Err(SponsorError::TransactionReverted {
                    account: intent.account,
                    step,
                    nonce: intent.nonce(),
                    tx_hash,
                    reason,
                })
            }
            Confirmation::TimedOut => {
                intent.advance(TxState::TimedOut);
                Err(SponsorError::ConfirmationTimeout {
                    account: intent.account,
                    step,
                    nonce: intent.nonce(),
                    tx_hash,
                })
            }
        };
        self.publish(intent);
        result
    }

    /// Best effort. A failed replay leaves the revert without a reason.
    async fn revert_reason(&self, intent: &TransactionIntent, tx_hash: TxHash) -> Option<String> {
        let IntentPayload::Batch { request, signature } = &intent.payload else {
            return None;
        };
        match self
            .ledger
            .batch_revert_reason(tx_hash, intent.account, &request.calls, signature)
            .await
        {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!("could not replay reverted batch {}: {}", tx_hash, e);
                None
            }
        }
    }

    /// Sends an authorization or revocation and waits for it to settle.
    pub async fn submit_authorization(
        &self,
        account: Address,
        authorization: SignedAuthorization,
    ) -> Result<TxOutcome> {
        let mut intent = self.authorization_intent(account, authorization);
        self.dispatch(&mut intent).await?;
        self.confirm(&mut intent).await
    }

    /// Simulates, sends and waits for a signed batch.
    pub async fn submit_batch(
        &self,
        account: Address,
        request: BatchRequest,
        signature: Bytes,
    ) -> Result<TxOutcome> {
        let mut intent = self.batch_intent(account, request, signature);
        self.dispatch(&mut intent).await?;
        self.confirm(&mut intent).await
    }
}

pub(crate) fn simulation_error(account: Address, nonce: U256, reason: String) -> SponsorError {
    match RevertKind::classify(&reason) {
        RevertKind::InvalidSignature => SponsorError::SignatureRejected { account, nonce },
        RevertKind::InsufficientFunds => SponsorError::InsufficientFunds {
            account,
            step: Step::Simulation,
            nonce: Some(nonce),
            reason,
        },
        RevertKind::CallReverted | RevertKind::Other => SponsorError::CallReverted {
            account,
            nonce,
            reason,
        },
    }
}
