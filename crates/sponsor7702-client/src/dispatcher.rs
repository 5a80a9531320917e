//! Runs many accounts at once, one task per account.
//!
//! Every registered account gets its own [`AccountController`] living in a spawned
//! task that drains an `mpsc` job queue. Jobs for one account run strictly in arrival
//! order; different accounts never wait on each other.

use futures::future::join_all;
use sponsor7702_primitives::alloy::primitives::Address;
use sponsor7702_primitives::alloy::signers::Signer;
use sponsor7702_primitives::Call;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{ConfigError, ControllerConfig};
use crate::controller::{AccountController, RunOutcome};
use crate::error::{Result, SponsorError};
use crate::events::EventBus;
use crate::ledger::Ledger;
use crate::relayer::TxOutcome;

const JOB_QUEUE_CAPACITY: usize = 32;

enum AccountJob {
    Run {
        calls: Vec<Call>,
        reply: oneshot::Sender<Result<RunOutcome>>,
    },
    Revoke {
        reply: oneshot::Sender<Result<Vec<TxOutcome>>>,
    },
}

struct AccountWorker {
    jobs: mpsc::Sender<AccountJob>,
    handle: JoinHandle<()>,
}

pub struct SponsorDispatcher<L> {
    ledger: Arc<L>,
    events: EventBus,
    workers: HashMap<Address, AccountWorker>,
}

impl<L> std::fmt::Debug for SponsorDispatcher<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SponsorDispatcher")
            .field("accounts", &self.workers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<L> SponsorDispatcher<L>
where
    L: Ledger + 'static,
{
    pub fn new(ledger: Arc<L>, events: EventBus) -> Self {
        Self {
            ledger,
            events,
            workers: HashMap::new(),
        }
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.workers.keys().copied().collect()
    }

    /// Starts a controller task for the account `signer` controls.
    pub fn register<S>(&mut self, config: ControllerConfig, signer: S) -> Result<Address>
    where
        S: Signer + Send + Sync + 'static,
    {
        let account = signer.address();
        if self.workers.contains_key(&account) {
            return Err(ConfigError::InvalidValue(format!("{account} is already registered")).into());
        }

        let controller =
            AccountController::new(config, self.ledger.clone(), signer, self.events.clone())?;
        let (jobs, receiver) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let handle = tokio::spawn(run_account(controller, receiver));

        tracing::info!("registered controller for {}", account);
        self.workers.insert(account, AccountWorker { jobs, handle });
        Ok(account)
    }

    async fn submit(&self, account: Address, job: AccountJob) -> Result<()> {
        let worker = self
            .workers
            .get(&account)
            .ok_or(SponsorError::ControllerUnavailable(account))?;
        worker
            .jobs
            .send(job)
            .await
            .map_err(|_| SponsorError::ControllerUnavailable(account))
    }

    /// Queues the full flow for `account` and waits for its result.
    pub async fn execute(&self, account: Address, calls: Vec<Call>) -> Result<RunOutcome> {
        let (reply, response) = oneshot::channel();
        self.submit(account, AccountJob::Run { calls, reply }).await?;
        response
            .await
            .map_err(|_| SponsorError::ControllerUnavailable(account))?
    }

    /// Queues a revocation for `account` and waits for its result.
    pub async fn revoke(&self, account: Address) -> Result<Vec<TxOutcome>> {
        let (reply, response) = oneshot::channel();
        self.submit(account, AccountJob::Revoke { reply }).await?;
        response
            .await
            .map_err(|_| SponsorError::ControllerUnavailable(account))?
    }

    /// Closes every queue and waits for queued jobs to finish.
    pub async fn shutdown(self) {
        let (accounts, handles): (Vec<_>, Vec<_>) = self
            .workers
            .into_iter()
            .map(|(account, worker)| (account, worker.handle))
            .unzip();

        for (account, result) in accounts.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                tracing::error!("controller task for {} ended abnormally: {}", account, e);
            }
        }
    }
}

async fn run_account<L, S>(
    mut controller: AccountController<L, S>,
    mut jobs: mpsc::Receiver<AccountJob>,
) where
    L: Ledger,
    S: Signer + Send + Sync,
{
    while let Some(job) = jobs.recv().await {
        match job {
            AccountJob::Run { calls, reply } => {
                let _ = reply.send(controller.run(calls).await);
            }
            AccountJob::Revoke { reply } => {
                let _ = reply.send(controller.revoke().await);
            }
        }
    }
    tracing::debug!("controller for {} stopped", controller.account());
}
