//! Sponsored EIP-7702 batch execution.
//!
//! A sponsor pays for an account to delegate its code to a batch contract and then to
//! run a signed batch of calls through it. [`controller::AccountController`] drives one
//! account through that flow; [`dispatcher::SponsorDispatcher`] runs many accounts
//! side by side.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod inspector;
pub mod ledger;
pub mod planner;
pub mod relayer;
pub mod signer;

pub use config::{ControllerConfig, GasParams, SponsorConfig};
pub use controller::{AccountController, BatchOutcome, FlowState, RunOutcome};
pub use dispatcher::SponsorDispatcher;
pub use error::{Result, SponsorError, Step};
pub use events::{spawn_event_logger, EventBus, FlowEvent, FlowEventKind};
pub use ledger::rpc::RpcLedger;
pub use ledger::Ledger;
