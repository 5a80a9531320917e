//! Canonical call encoding and the batch digest.
//!
//! The delegated contract verifies `keccak256(abi.encodePacked(nonce, encodedCalls))`
//! where `encodedCalls` concatenates `abi.encodePacked(to, value, data)` for every call
//! in order. Any drift from that layout makes every signature unverifiable.

use alloy::primitives::{keccak256, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::Call;

/// Packs `to (20 bytes) || value (32 bytes) || data` for each call, with no padding
/// between calls.
#[must_use]
pub fn encode_calls(calls: &[Call]) -> Bytes {
    calls
        .iter()
        .flat_map(|call| {
            [
                call.to.abi_encode_packed(),
                call.value.abi_encode_packed(),
                call.data.abi_encode_packed(),
            ]
        })
        .flatten()
        .collect::<Vec<u8>>()
        .into()
}

/// `keccak256(nonce as 32 big-endian bytes || encode_calls(calls))`
#[must_use]
pub fn batch_digest(nonce: U256, calls: &[Call]) -> B256 {
    let preimage = [
        nonce.abi_encode_packed(),
        encode_calls(calls).to_vec(),
    ]
    .concat();

    keccak256(preimage)
}

/// A batch bound to the contract nonce it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub nonce: U256,
    pub calls: Vec<Call>,
}

impl BatchRequest {
    pub fn new(nonce: U256, calls: Vec<Call>) -> Self {
        Self { nonce, calls }
    }

    pub fn digest(&self) -> B256 {
        batch_digest(self.nonce, &self.calls)
    }

    /// Sum of native value the calls forward. Saturates instead of wrapping, the
    /// caller only compares it against a balance.
    pub fn total_value(&self) -> U256 {
        self.calls
            .iter()
            .fold(U256::ZERO, |acc, call| acc.saturating_add(call.value))
    }
}
