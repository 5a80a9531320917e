//! Per-account flow: inspect, plan, authorize, sign, execute.
//!
//! One controller owns one account and every operation takes `&mut self`, so two steps
//! for the same account can never interleave. Every step that sends a transaction waits
//! for it to settle, and every authorization change is read back from chain before the
//! flow continues.

use serde::Serialize;
use sponsor7702_primitives::alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use sponsor7702_primitives::alloy::signers::Signer;
use sponsor7702_primitives::{BatchRequest, Call, DelegationDesignator};
use std::sync::Arc;

use crate::config::ControllerConfig;
use crate::error::{Result, SponsorError, Step};
use crate::events::{EventBus, FlowEventKind};
use crate::inspector::{DelegationInspector, Inspection};
use crate::ledger::Ledger;
use crate::planner::{AuthorizationPlanner, AuthorizationStep};
use crate::relayer::{RelayerExecutor, TxOutcome};
use crate::signer::SignerAgent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FlowState {
    Idle,
    Inspecting,
    Planning,
    Authorizing,
    Confirming,
    Signing,
    Executing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Contract nonce the batch was signed over and consumed.
    pub nonce: U256,
    pub digest: B256,
    pub tx_hash: TxHash,
    pub gas_used: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub authorizations: Vec<TxOutcome>,
    pub batch: BatchOutcome,
    pub revocations: Vec<TxOutcome>,
}

pub struct AccountController<L, S> {
    account: Address,
    config: ControllerConfig,
    ledger: Arc<L>,
    inspector: DelegationInspector<L>,
    planner: AuthorizationPlanner,
    signer: SignerAgent<S>,
    relayer: RelayerExecutor<L>,
    events: EventBus,
    state: FlowState,
}

impl<L, S> std::fmt::Debug for AccountController<L, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountController")
            .field("account", &self.account)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<L, S> AccountController<L, S>
where
    L: Ledger,
    S: Signer + Send + Sync,
{
    pub fn new(
        config: ControllerConfig,
        ledger: Arc<L>,
        signer: S,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let signer = SignerAgent::new(signer, config.signature_scheme);
        let relayer = RelayerExecutor::new(
            ledger.clone(),
            config.gas.clone(),
            config.confirmation_timeout,
            events.clone(),
        );

        Ok(Self {
            account: signer.address(),
            inspector: DelegationInspector::new(ledger.clone()),
            planner: AuthorizationPlanner::new(config.batch_contract),
            signer,
            relayer,
            ledger,
            config,
            events,
            state: FlowState::Idle,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn transition(&mut self, to: FlowState) {
        if self.state == to {
            return;
        }
        self.events.emit(
            self.account,
            FlowEventKind::StateChanged {
                from: self.state,
                to,
            },
        );
        self.state = to;
    }

    /// Publishes a failure and returns to idle either way.
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!("flow for {} stopped in {:?}: {}", self.account, self.state, e);
            self.events.emit(
                self.account,
                FlowEventKind::Failed {
                    step: e.step(),
                    error: e.to_string(),
                },
            );
        }
        self.transition(FlowState::Idle);
        result
    }

    /// Reads the account's current delegation against the configured contract.
    pub async fn inspect(&mut self) -> Result<Inspection> {
        let result = self.inspect_account().await;
        self.finish(result)
    }

    /// Brings the account to `Delegated(batch_contract)`, returning the confirmed
    /// authorization transactions (empty when already delegated).
    pub async fn ensure_delegation(&mut self) -> Result<Vec<TxOutcome>> {
        let result = self.delegate().await;
        self.finish(result)
    }

    /// Signs `calls` at the contract's current nonce and executes them through the
    /// sponsor. The account must already be delegated to the batch contract.
    pub async fn execute_batch(&mut self, calls: Vec<Call>) -> Result<BatchOutcome> {
        let result = self.execute(calls).await;
        self.finish(result)
    }

    /// Clears any delegation the account carries.
    pub async fn revoke(&mut self) -> Result<Vec<TxOutcome>> {
        let result = self.clear_delegation().await;
        self.finish(result)
    }

    /// Ensure delegation, execute, then revoke when configured to.
    pub async fn run(&mut self, calls: Vec<Call>) -> Result<RunOutcome> {
        let result = self.run_flow(calls).await;
        self.finish(result)
    }

    async fn run_flow(&mut self, calls: Vec<Call>) -> Result<RunOutcome> {
        let authorizations = self.delegate().await?;
        let batch = self.execute(calls).await?;
        let revocations = if self.config.revoke_after_execution {
            self.clear_delegation().await?
        } else {
            vec![]
        };

        Ok(RunOutcome {
            authorizations,
            batch,
            revocations,
        })
    }

    async fn inspect_account(&mut self) -> Result<Inspection> {
        self.transition(FlowState::Inspecting);
        let inspection = self
            .inspector
            .classify(self.account, self.config.batch_contract)
            .await?;
        self.events.emit(
            self.account,
            FlowEventKind::Inspected {
                designator: inspection.designator.clone(),
            },
        );
        Ok(inspection)
    }

    async fn delegate(&mut self) -> Result<Vec<TxOutcome>> {
        let inspection = self.inspect_account().await?;

        self.transition(FlowState::Planning);
        let steps = self.planner.plan(&inspection.designator);
        self.apply_plan(steps).await
    }

    async fn clear_delegation(&mut self) -> Result<Vec<TxOutcome>> {
        let inspection = self.inspect_account().await?;

        self.transition(FlowState::Planning);
        let steps = self.planner.plan_revocation(&inspection.designator);
        self.apply_plan(steps).await
    }

    async fn apply_plan(&mut self, steps: Vec<AuthorizationStep>) -> Result<Vec<TxOutcome>> {
        self.events.emit(
            self.account,
            FlowEventKind::Planned {
                steps: steps.clone(),
            },
        );

        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            outcomes.push(self.apply_step(step).await?);
        }
        Ok(outcomes)
    }

    /// Signs, sends and confirms one authorization, then checks the account reads as
    /// the step promised.
    async fn apply_step(&mut self, step: AuthorizationStep) -> Result<TxOutcome> {
        let account = self.account;
        let flow_step = match step {
            AuthorizationStep::Revoke => Step::Revocation,
            AuthorizationStep::Authorize(_) => Step::Authorization,
        };
        self.transition(FlowState::Authorizing);

        // the authorization nonce must be the account's count at send time
        let chain_id = self
            .ledger
            .chain_id()
            .await
            .map_err(|e| SponsorError::from_ledger(e, account, flow_step, None))?;
        let tx_nonce = self
            .ledger
            .transaction_count(account)
            .await
            .map_err(|e| SponsorError::from_ledger(e, account, flow_step, None))?;

        let authorization = self
            .signer
            .sign_authorization(chain_id, step.target(), tx_nonce)
            .await?;

        let mut intent = self.relayer.authorization_intent(account, authorization);
        self.relayer.dispatch(&mut intent).await?;

        self.transition(FlowState::Confirming);
        let outcome = self.relayer.confirm(&mut intent).await?;

        self.transition(FlowState::Inspecting);
        let found = self.inspector.designator(account).await?;
        self.events.emit(
            account,
            FlowEventKind::Inspected {
                designator: found.clone(),
            },
        );
        let expected = step.expected_designator();
        if found != expected {
            return Err(SponsorError::StateMismatch {
                account,
                step: flow_step,
                expected,
                found,
            });
        }

        Ok(outcome)
    }

    async fn execute(&mut self, calls: Vec<Call>) -> Result<BatchOutcome> {
        let account = self.account;
        let inspection = self.inspect_account().await?;
        if !inspection.is_target {
            return Err(SponsorError::StateMismatch {
                account,
                step: Step::Execution,
                expected: DelegationDesignator::Delegated(self.config.batch_contract),
                found: inspection.designator,
            });
        }

        self.transition(FlowState::Signing);
        // read right before signing; a stale nonce only yields a rejected signature
        let nonce = self
            .ledger
            .batch_nonce(account)
            .await
            .map_err(|e| SponsorError::from_ledger(e, account, Step::Signing, None))?;
        let request = BatchRequest::new(nonce, calls);
        let digest = request.digest();
        let signature = self.signer.sign_batch(digest).await?;
        self.events
            .emit(account, FlowEventKind::BatchSigned { nonce, digest });

        self.transition(FlowState::Executing);
        let mut intent = self.relayer.batch_intent(
            account,
            request,
            Bytes::copy_from_slice(&signature.as_bytes()),
        );
        self.relayer.dispatch(&mut intent).await?;

        self.transition(FlowState::Confirming);
        let outcome = self.relayer.confirm(&mut intent).await?;

        Ok(BatchOutcome {
            nonce,
            digest,
            tx_hash: outcome.tx_hash,
            gas_used: outcome.gas_used,
        })
    }
}
