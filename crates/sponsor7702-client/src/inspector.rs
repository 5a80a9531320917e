use sponsor7702_primitives::alloy::primitives::Address;
use sponsor7702_primitives::DelegationDesignator;
use std::sync::Arc;

use crate::error::{Result, SponsorError, Step};
use crate::ledger::Ledger;

/// Result of reading an account against the wanted implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub designator: DelegationDesignator,
    pub is_target: bool,
}

/// Read-only view of account delegation.
pub struct DelegationInspector<L> {
    ledger: Arc<L>,
}

impl<L> std::fmt::Debug for DelegationInspector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationInspector").finish_non_exhaustive()
    }
}

impl<L> Clone for DelegationInspector<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<L: Ledger> DelegationInspector<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Reads the account's code and decodes its designator.
    pub async fn designator(&self, account: Address) -> Result<DelegationDesignator> {
        let code = self
            .ledger
            .code(account)
            .await
            .map_err(|e| SponsorError::from_ledger(e, account, Step::Inspection, None))?;
        Ok(DelegationDesignator::from_code(&code))
    }

    pub async fn classify(&self, account: Address, target: Address) -> Result<Inspection> {
        let designator = self.designator(account).await?;
        let is_target = designator.targets(target);
        tracing::debug!("inspected {}: {} (target {})", account, designator, is_target);
        Ok(Inspection {
            designator,
            is_target,
        })
    }
}
