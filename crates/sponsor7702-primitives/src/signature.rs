use alloy::primitives::{eip191_hash_message, Address, PrimitiveSignature, B256};
use serde::{Deserialize, Serialize};

use crate::{PrimitivesError, Result};

/// How a batch digest is wrapped before it is signed and recovered.
///
/// Signer and verifying contract must agree on this. `BatchCallAndSponsor` recovers
/// from the EIP-191 personal message hash of the 32 digest bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    /// `keccak256("\x19Ethereum Signed Message:\n32" || digest)`
    #[default]
    PersonalMessage,
    /// The digest itself is the signed hash.
    RawDigest,
}

impl SignatureScheme {
    /// The 32 byte hash the key actually signs for `digest`.
    pub fn signing_hash(&self, digest: B256) -> B256 {
        match self {
            Self::PersonalMessage => eip191_hash_message(digest),
            Self::RawDigest => digest,
        }
    }

    /// Recovers the signer of `digest` under this scheme.
    pub fn recover(&self, digest: B256, signature: &PrimitiveSignature) -> Result<Address> {
        signature
            .recover_address_from_prehash(&self.signing_hash(digest))
            .map_err(|e| PrimitivesError::SignatureError(e.to_string()))
    }

    /// Like [`Self::recover`] but starting from the 65 byte `r || s || v` encoding
    /// carried in calldata.
    pub fn recover_from_bytes(&self, digest: B256, signature: &[u8]) -> Result<Address> {
        let signature = PrimitiveSignature::try_from(signature)
            .map_err(|e| PrimitivesError::SignatureError(e.to_string()))?;
        self.recover(digest, &signature)
    }
}
