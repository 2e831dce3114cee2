//! # Staking Configuration & Constants
//!
//! Every magic number in the staking engine lives here. If you're hardcoding
//! a lock duration somewhere else, you're doing it wrong.
//!
//! Constants define the reference deployment (token decimals, initial
//! supply, default rate and lock). [`StakingConfig`] is the explicit,
//! per-deployment state that replaces them at runtime: it is created once,
//! validated, and handed to the ledger at deploy time. Nothing reads a
//! global after that.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::time::{Timestamp, DAY};
use crate::Amount;

// ---------------------------------------------------------------------------
// Token Parameters
// ---------------------------------------------------------------------------

/// Human-readable name of the reference staking token.
pub const TOKEN_NAME: &str = "Nauh Token";

/// Ticker symbol of the reference staking token.
pub const TOKEN_SYMBOL: &str = "NAUH";

/// Decimal places. 18, like every ERC-20 that doesn't want to surprise
/// anyone. Display only; the ledger never divides.
pub const TOKEN_DECIMALS: u8 = 18;

/// One whole token in smallest units.
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000;

/// Supply minted to the deployer at genesis: one million whole tokens.
pub const INITIAL_SUPPLY: Amount = 1_000_000 * ONE_TOKEN;

// ---------------------------------------------------------------------------
// Staking Parameters
// ---------------------------------------------------------------------------

/// Default reward rate, in reward units per staked unit per second.
pub const DEFAULT_REWARD_RATE: Amount = 100;

/// Default minimum time stake must stay put before it can be unstaked.
/// One day.
pub const DEFAULT_LOCK_DURATION: Timestamp = DAY;

/// Upper bound on the lock duration. A year-long lock is a product
/// decision; anything beyond that is almost certainly a units mistake
/// (milliseconds instead of seconds).
pub const MAX_LOCK_DURATION: Timestamp = 365 * DAY;

// ---------------------------------------------------------------------------
// Contract Labels
// ---------------------------------------------------------------------------

/// Label the token contract address is derived from.
pub const TOKEN_LABEL: &str = "nauh-token";

/// Label the reward manager (reward custodian) address is derived from.
pub const REWARD_MANAGER_LABEL: &str = "reward-manager";

/// Label the token vault address is derived from.
pub const TOKEN_VAULT_LABEL: &str = "token-vault";

// ---------------------------------------------------------------------------
// StakingConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`StakingConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value outside its allowed range.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Deploy-time parameters of a staking ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StakingConfig {
    /// Rate of the genesis checkpoint.
    pub initial_reward_rate: Amount,
    /// Lock window, in seconds, measured from the latest stake increase.
    pub lock_duration: Timestamp,
    /// Supply minted to the deployer.
    pub initial_supply: Amount,
    /// Amount the deployer moves into reward custody at genesis. Zero means
    /// the pool starts empty and must be funded by a plain transfer.
    pub initial_reward_funding: Amount,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            initial_reward_rate: DEFAULT_REWARD_RATE,
            lock_duration: DEFAULT_LOCK_DURATION,
            initial_supply: INITIAL_SUPPLY,
            initial_reward_funding: 0,
        }
    }
}

impl StakingConfig {
    /// Parses and validates a JSON config document. Missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StakingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&raw)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "staking config loaded");
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_duration > MAX_LOCK_DURATION {
            return Err(ConfigError::Invalid {
                field: "lock_duration",
                reason: format!(
                    "{} seconds exceeds the maximum of {}",
                    self.lock_duration, MAX_LOCK_DURATION
                ),
            });
        }
        if self.initial_reward_funding > self.initial_supply {
            return Err(ConfigError::Invalid {
                field: "initial_reward_funding",
                reason: format!(
                    "{} exceeds the initial supply of {}",
                    self.initial_reward_funding, self.initial_supply
                ),
            });
        }
        Ok(())
    }
}
