//! Client Configurations

use serde::{Deserialize, Serialize};
use sponsor7702_primitives::alloy::primitives::{Address, U256};
use sponsor7702_primitives::SignatureScheme;
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use url::Url;

const DEFAULT_AUTHORIZATION_GAS_LIMIT: u64 = 100_000;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Caller supplied fee values. Nothing here is estimated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    #[serde(default = "default_authorization_gas_limit")]
    pub authorization_gas_limit: u64,
}

impl GasParams {
    /// Same price for both the cap and the tip.
    pub fn flat(fee_per_gas: u128) -> Self {
        Self {
            max_fee_per_gas: fee_per_gas,
            max_priority_fee_per_gas: fee_per_gas,
            authorization_gas_limit: DEFAULT_AUTHORIZATION_GAS_LIMIT,
        }
    }

    /// Worst case the sponsor pays for one authorization transaction.
    pub fn authorization_cost(&self) -> U256 {
        U256::from(self.authorization_gas_limit) * U256::from(self.max_fee_per_gas)
    }
}

fn default_authorization_gas_limit() -> u64 {
    DEFAULT_AUTHORIZATION_GAS_LIMIT
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Serializable sponsor config (for loading from files). Private keys are never part
/// of it.
#[derive(Debug, Clone, Deserialize)]
pub struct SponsorConfig {
    pub rpc_url: String,
    pub log_level: String,
    pub batch_contract: Address,
    pub gas: GasParams,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default)]
    pub signature_scheme: SignatureScheme,
    #[serde(default)]
    pub revoke_after_execution: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Failed to parse log level: {0}")]
    LogLevelParseError(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl SponsorConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: SponsorConfig = serde_json::from_str(data)?;
        Ok(config)
    }

    pub fn rpc_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.rpc_url).map_err(ConfigError::from)
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevelParseError(self.log_level.clone()))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Validated runtime config for one account controller.
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        let config = ControllerConfig {
            batch_contract: self.batch_contract,
            gas: self.gas.clone(),
            confirmation_timeout: self.confirmation_timeout(),
            signature_scheme: self.signature_scheme,
            revoke_after_execution: self.revoke_after_execution,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Runtime config handed to an `AccountController` at construction.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub batch_contract: Address,
    pub gas: GasParams,
    pub confirmation_timeout: Duration,
    pub signature_scheme: SignatureScheme,
    pub revoke_after_execution: bool,
}

impl ControllerConfig {
    pub fn new(batch_contract: Address, gas: GasParams) -> Self {
        Self {
            batch_contract,
            gas,
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            signature_scheme: SignatureScheme::default(),
            revoke_after_execution: false,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_signature_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.signature_scheme = scheme;
        self
    }

    pub fn with_revoke_after_execution(mut self, revoke: bool) -> Self {
        self.revoke_after_execution = revoke;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_contract.is_zero() {
            // delegating to zero is a revocation, never a valid target
            return Err(ConfigError::InvalidValue(
                "batch_contract must not be the zero address".into(),
            ));
        }
        if self.gas.max_priority_fee_per_gas > self.gas.max_fee_per_gas {
            return Err(ConfigError::InvalidValue(
                "max_priority_fee_per_gas exceeds max_fee_per_gas".into(),
            ));
        }
        if self.gas.authorization_gas_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "authorization_gas_limit must be non-zero".into(),
            ));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "confirmation timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
