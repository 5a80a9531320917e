//! Decides which authorization transactions bring an account to its target.
//!
//! | current          | steps                         |
//! |------------------|-------------------------------|
//! | plain            | `[Authorize(T)]`              |
//! | delegated to T   | `[]`                          |
//! | delegated to X   | `[Revoke, Authorize(T)]`      |
//! | unrecognized     | `[Revoke, Authorize(T)]`      |
//!
//! A designator is never overwritten in place. Each step must be confirmed before
//! the next one is sent.

use serde::Serialize;
use sponsor7702_primitives::alloy::primitives::Address;
use sponsor7702_primitives::DelegationDesignator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthorizationStep {
    /// Authorize the zero address, which clears the designator.
    Revoke,
    Authorize(Address),
}

impl AuthorizationStep {
    /// Address the signed authorization points at.
    pub fn target(&self) -> Address {
        match self {
            Self::Revoke => Address::ZERO,
            Self::Authorize(target) => *target,
        }
    }

    /// What the account must read as once this step is confirmed.
    pub fn expected_designator(&self) -> DelegationDesignator {
        match self {
            Self::Revoke => DelegationDesignator::None,
            Self::Authorize(target) => DelegationDesignator::Delegated(*target),
        }
    }
}

impl std::fmt::Display for AuthorizationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revoke => write!(f, "revoke"),
            Self::Authorize(target) => write!(f, "authorize({target})"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthorizationPlanner {
    target: Address,
}

impl AuthorizationPlanner {
    pub fn new(target: Address) -> Self {
        Self { target }
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn plan(&self, current: &DelegationDesignator) -> Vec<AuthorizationStep> {
        match current {
            DelegationDesignator::None => vec![AuthorizationStep::Authorize(self.target)],
            DelegationDesignator::Delegated(target) if *target == self.target => vec![],
            DelegationDesignator::Delegated(_) | DelegationDesignator::Unknown(_) => vec![
                AuthorizationStep::Revoke,
                AuthorizationStep::Authorize(self.target),
            ],
        }
    }

    /// Steps returning the account to a plain account.
    pub fn plan_revocation(&self, current: &DelegationDesignator) -> Vec<AuthorizationStep> {
        match current {
            DelegationDesignator::None => vec![],
            _ => vec![AuthorizationStep::Revoke],
        }
    }
}
