use sponsor7702_primitives::alloy::eips::{Authorization, SignedAuthorization};
use sponsor7702_primitives::alloy::primitives::{Address, PrimitiveSignature, B256};
use sponsor7702_primitives::alloy::signers::Signer;
use sponsor7702_primitives::SignatureScheme;

use crate::error::{Result, SponsorError, Step};

/// Holds the account key. Produces signatures, never sends anything.
#[derive(Debug, Clone)]
pub struct SignerAgent<S> {
    signer: S,
    scheme: SignatureScheme,
}

impl<S> SignerAgent<S>
where
    S: Signer + Send + Sync,
{
    pub fn new(signer: S, scheme: SignatureScheme) -> Self {
        Self { signer, scheme }
    }

    /// The account the key controls.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Signs an EIP-7702 authorization. `target` of zero is a revocation; `nonce` is
    /// the account's current transaction count.
    pub async fn sign_authorization(
        &self,
        chain_id: u64,
        target: Address,
        nonce: u64,
    ) -> Result<SignedAuthorization> {
        let step = if target.is_zero() {
            Step::Revocation
        } else {
            Step::Authorization
        };
        let authorization = Authorization {
            chain_id,
            address: target,
            nonce,
        };

        let signature = self
            .signer
            .sign_hash(&authorization.signature_hash())
            .await
            .map_err(|e| SponsorError::SigningError {
                account: self.address(),
                step,
                reason: e.to_string(),
            })?;

        Ok(authorization.into_signed(signature))
    }

    /// Signs a batch digest under the configured scheme.
    pub async fn sign_batch(&self, digest: B256) -> Result<PrimitiveSignature> {
        self.signer
            .sign_hash(&self.scheme.signing_hash(digest))
            .await
            .map_err(|e| SponsorError::SigningError {
                account: self.address(),
                step: Step::Signing,
                reason: e.to_string(),
            })
    }
}
