//! Core types for sponsored EIP-7702 batch execution
//!
//! This crate re-exports the alloy types shared across the workspace so every crate
//! agrees on one version, and holds the network-free parts of the protocol: the call
//! encoding that gets signed, the delegation designator codec and the verification
//! rules the on-chain batch contract applies.

pub mod alloy {
    pub mod primitives {
        pub use alloy::primitives::{
            address, b256, bytes, fixed_bytes, keccak256, Address, Bytes, FixedBytes,
            PrimitiveSignature, TxHash, B256, U256,
        };
    }

    pub mod network {
        pub use alloy::network::{
            Ethereum, EthereumWallet, Network, ReceiptResponse, TransactionBuilder,
            TransactionBuilder7702,
        };
    }

    pub mod eips {
        pub use alloy::eips::eip7702::{Authorization, SignedAuthorization};
        pub use alloy::eips::BlockId;
    }

    pub mod providers {
        pub use alloy::providers::{PendingTransactionConfig, Provider, ProviderBuilder};
    }

    pub mod transports {
        pub use alloy::transports::Transport;
    }

    pub mod rpc {
        pub use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
    }

    pub mod signers {
        pub use alloy::signers::{local::PrivateKeySigner, Signer};
    }

    pub mod sol_types {
        pub use alloy::sol_types::{decode_revert_reason, SolCall, SolValue};
    }
}

pub mod abi;
pub mod contract;
pub mod delegation;
pub mod encoding;
pub mod error;
pub mod signature;

pub use abi::batch_call_and_sponsor::BatchCallAndSponsor::Call;
pub use delegation::DelegationDesignator;
pub use encoding::BatchRequest;
pub use error::{PrimitivesError, Result};
pub use signature::SignatureScheme;
