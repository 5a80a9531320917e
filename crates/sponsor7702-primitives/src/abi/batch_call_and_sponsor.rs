use alloy::sol;
use serde::{Deserialize, Serialize};

// Implementation contract an account delegates to. Code runs at the delegated
// account, so `address(this)` is the signer being verified against.
sol! {
    #[sol(rpc)]
    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    contract BatchCallAndSponsor {
        struct Call {
            address to;
            uint256 value;
            bytes data;
        }

        event CallExecuted(address indexed sender, address indexed to, uint256 value, bytes data);

        function execute(Call[] calldata calls, bytes calldata signature) external payable;
        function nonce() external view returns (uint256);
    }
}
