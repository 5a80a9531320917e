use sponsor7702_client::config::{ControllerConfig, GasParams};
use sponsor7702_client::controller::AccountController;
use sponsor7702_client::events::EventBus;
use sponsor7702_primitives::alloy::primitives::{address, Address, U256};
use sponsor7702_primitives::alloy::signers::PrivateKeySigner;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::mock_chain::MockChain;

// hardhat development accounts
pub const SPONSOR: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const ALICE_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const ALICE: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const BOB_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";
pub const BOB: Address = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");
pub const CHARLIE: Address = address!("90F79bf6EB2c4f870365E785982E1f101E93b906");

pub const BATCH_CONTRACT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const OTHER_CONTRACT: Address = address!("8AF99B0092650d77EBf470A2d7e935dC1093073d");
pub const TOKEN: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");
pub const STAKE: Address = address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0");

/// 0.11 gwei
pub const FEE_PER_GAS: u128 = 110_000_000;

pub fn one_ether() -> U256 {
    U256::from(10u64).pow(U256::from(18))
}

pub fn tokens(amount: u64) -> U256 {
    U256::from(amount) * one_ether()
}

pub fn signer(key: &str) -> PrivateKeySigner {
    PrivateKeySigner::from_str(key).unwrap()
}

/// Chain with a funded sponsor.
pub fn chain() -> Arc<MockChain> {
    let chain = MockChain::new(SPONSOR, BATCH_CONTRACT, TOKEN, STAKE);
    chain.fund(SPONSOR, one_ether());
    Arc::new(chain)
}

pub fn controller_config() -> ControllerConfig {
    ControllerConfig::new(BATCH_CONTRACT, GasParams::flat(FEE_PER_GAS))
        .with_confirmation_timeout(Duration::from_secs(5))
}

pub fn controller(
    chain: &Arc<MockChain>,
    key: &str,
    events: &EventBus,
) -> AccountController<MockChain, PrivateKeySigner> {
    AccountController::new(controller_config(), chain.clone(), signer(key), events.clone()).unwrap()
}
