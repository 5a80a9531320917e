//! Structured progress events published by account flows.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sponsor7702_primitives::alloy::primitives::{Address, TxHash, B256, U256};
use sponsor7702_primitives::DelegationDesignator;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::controller::FlowState;
use crate::error::Step;
use crate::planner::AuthorizationStep;
use crate::relayer::{IntentKind, TxState};

#[derive(Debug, Clone, Serialize)]
pub struct FlowEvent {
    pub account: Address,
    pub at: DateTime<Utc>,
    pub kind: FlowEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FlowEventKind {
    StateChanged {
        from: FlowState,
        to: FlowState,
    },
    Inspected {
        designator: DelegationDesignator,
    },
    Planned {
        steps: Vec<AuthorizationStep>,
    },
    Transaction {
        kind: IntentKind,
        state: TxState,
        tx_hash: Option<TxHash>,
    },
    BatchSigned {
        nonce: U256,
        digest: B256,
    },
    Failed {
        step: Option<Step>,
        error: String,
    },
}

/// Broadcast channel for [`FlowEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, account: Address, kind: FlowEventKind) {
        let event = FlowEvent {
            account,
            at: Utc::now(),
            kind,
        };
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

fn log_event(event: &FlowEvent) {
    let account = event.account;
    match &event.kind {
        FlowEventKind::StateChanged { from, to } => {
            tracing::debug!("{}: {:?} -> {:?}", account, from, to)
        }
        FlowEventKind::Inspected { designator } => tracing::info!("{}: {}", account, designator),
        FlowEventKind::Planned { steps } if steps.is_empty() => {
            tracing::info!("{}: delegation already in place", account)
        }
        FlowEventKind::Planned { steps } => tracing::info!("{}: planned {:?}", account, steps),
        FlowEventKind::Transaction {
            kind,
            state,
            tx_hash,
        } => match tx_hash {
            Some(hash) => tracing::info!("{}: {:?} {:?} ({})", account, kind, state, hash),
            None => tracing::info!("{}: {:?} {:?}", account, kind, state),
        },
        FlowEventKind::BatchSigned { nonce, digest } => {
            tracing::info!("{}: batch signed at nonce {} digest {}", account, nonce, digest)
        }
        FlowEventKind::Failed { step, error } => {
            tracing::error!("{}: failed during {:?}: {}", account, step, error)
        }
    }
}

/// Renders every event on `receiver` through `tracing` until the bus closes.
pub fn spawn_event_logger(mut receiver: broadcast::Receiver<FlowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event logger lagged, skipped {} events", skipped)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sponsor7702_primitives::alloy::primitives::address;

    const ALICE: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit(
            ALICE,
            FlowEventKind::Inspected {
                designator: DelegationDesignator::None,
            },
        );
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();

        bus.emit(
            ALICE,
            FlowEventKind::StateChanged {
                from: FlowState::Idle,
                to: FlowState::Inspecting,
            },
        );
        bus.emit(ALICE, FlowEventKind::Planned { steps: vec![] });

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.account, ALICE);
        assert!(matches!(first.kind, FlowEventKind::StateChanged { .. }));
        assert_eq!(second.kind, FlowEventKind::Planned { steps: vec![] });
        assert!(first.at <= second.at);
    }

    #[tokio::test]
    async fn logger_stops_when_bus_is_dropped() {
        let bus = EventBus::new(2);
        let handle = spawn_event_logger(bus.subscribe());
        for _ in 0..5 {
            bus.emit(ALICE, FlowEventKind::Planned { steps: vec![] });
        }
        drop(bus);
        handle.await.unwrap();
    }
}
