pub mod batch_call_and_sponsor;
pub mod erc20;
pub mod tier_stake;
