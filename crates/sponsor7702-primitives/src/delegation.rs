//! EIP-7702 delegation designator codec.
//!
//! A delegated account carries `0xef0100 || target` as its code. Comparisons are done on
//! decoded bytes, never on hex text, so checksum casing cannot cause a mismatch.

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

/// Magic prefix of an EIP-7702 designator (`0xef01`) followed by version `0x00`.
pub const DELEGATION_DESIGNATOR_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];

/// Designator length: prefix plus a 20 byte address.
pub const DELEGATION_DESIGNATOR_LEN: usize = DELEGATION_DESIGNATOR_PREFIX.len() + 20;

/// What an account's code says about its delegation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelegationDesignator {
    /// No code, a plain account.
    None,
    /// Code is a designator pointing at the contained implementation.
    Delegated(Address),
    /// Code is present but is not a recognized designator.
    Unknown(Bytes),
}

impl DelegationDesignator {
    /// Decodes raw account code.
    ///
    /// A designator pointing at the zero address is reported as [`Self::None`]: revoking
    /// clears the code, and a zero target delegates to nothing either way.
    pub fn from_code(code: &[u8]) -> Self {
        if code.is_empty() {
            return Self::None;
        }

        match code.strip_prefix(DELEGATION_DESIGNATOR_PREFIX.as_slice()) {
            Some(target) if code.len() == DELEGATION_DESIGNATOR_LEN => {
                let target = Address::from_slice(target);
                if target.is_zero() {
                    Self::None
                } else {
                    Self::Delegated(target)
                }
            }
            _ => Self::Unknown(Bytes::copy_from_slice(code)),
        }
    }

    /// Returns true only for a designator that points exactly at `target`.
    pub fn targets(&self, target: Address) -> bool {
        matches!(self, Self::Delegated(current) if *current == target)
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl std::fmt::Display for DelegationDesignator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "plain account"),
            Self::Delegated(target) => write!(f, "delegated to {target}"),
            Self::Unknown(code) => write!(f, "unrecognized code {code}"),
        }
    }
}

/// The code an account carries once it is delegated to `target`.
#[must_use]
pub fn designator_code(target: Address) -> Bytes {
    [DELEGATION_DESIGNATOR_PREFIX.as_slice(), target.as_slice()]
        .concat()
        .into()
}
