use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::Call;

// Mintable test token the mint and transfer flow runs against.
sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract MockERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function mint(address to, uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

pub fn mint_call(token: Address, to: Address, amount: U256) -> Call {
    Call {
        to: token,
        value: U256::ZERO,
        data: MockERC20::mintCall { to, amount }.abi_encode().into(),
    }
}

pub fn transfer_call(token: Address, to: Address, amount: U256) -> Call {
    Call {
        to: token,
        value: U256::ZERO,
        data: MockERC20::transferCall { to, amount }.abi_encode().into(),
    }
}

pub fn approve_call(token: Address, spender: Address, amount: U256) -> Call {
    Call {
        to: token,
        value: U256::ZERO,
        data: MockERC20::approveCall { spender, amount }.abi_encode().into(),
    }
}
