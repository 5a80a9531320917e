use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::Call;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract TierStake {
        struct StakeInfo {
            uint256 stakedAmount;
            uint256 pendingWithdrawAmount;
            uint256 withdrawRequestTime;
        }

        function stake(uint256 amount) external;
        function stakeInfo(address user) external view returns (StakeInfo memory);
        function totalStaked() external view returns (uint256);
    }
}

/// Builds the `stake(amount)` call. The token allowance must be granted earlier in
/// the same batch.
pub fn stake_call(stake_contract: Address, amount: U256) -> Call {
    Call {
        to: stake_contract,
        value: U256::ZERO,
        data: TierStake::stakeCall { amount }.abi_encode().into(),
    }
}
