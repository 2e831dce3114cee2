//! # Staking Error Taxonomy
//!
//! Every public staking operation returns [`StakingError`] on failure. Each
//! variant corresponds to exactly one violated precondition, and every one of
//! them aborts the whole operation: callers never observe a half-applied
//! deposit, stake or claim.
//!
//! Retry policy belongs to the caller. A `StakeLocked` is worth retrying once
//! `unlocks_at` has passed; an `Unauthorized` never is.

use thiserror::Error;

use crate::address::Address;
use crate::asset::AssetError;
use crate::auth::Role;
use crate::time::Timestamp;
use crate::Amount;

/// Errors surfaced by the reward ledger and the vault state machine.
#[derive(Debug, Error)]
pub enum StakingError {
    /// Withdraw or stake exceeds what is available for that operation.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The amount the operation may draw from.
        available: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// Unstake attempted before the lock window elapsed.
    #[error("stake is still locked until {unlocks_at} (now {now})")]
    StakeLocked {
        /// First instant at which unstaking is allowed.
        unlocks_at: Timestamp,
        /// Time of the rejected call.
        now: Timestamp,
    },

    /// Claim attempted with nothing accrued.
    #[error("no rewards to claim for {user}")]
    NoRewardsAvailable {
        /// The claiming account.
        user: Address,
    },

    /// The reward custodian cannot fund the payout.
    #[error("reward pool empty: custodian holds {available}, claim needs {required}")]
    RewardPoolEmpty {
        /// Reward-asset balance of the custodian.
        available: Amount,
        /// Pending reward being claimed.
        required: Amount,
    },

    /// The caller's context lacks the capability the operation requires.
    #[error("unauthorized: {caller} lacks the {role} role")]
    Unauthorized {
        /// The calling account.
        caller: Address,
        /// The role that was required.
        role: Role,
    },

    /// A checkpoint or settlement presented a time that goes backwards.
    #[error("invalid timestamp: {now} is not after {latest}")]
    InvalidTimestamp {
        /// The rejected time.
        now: Timestamp,
        /// The latest time already recorded.
        latest: Timestamp,
    },

    /// An accrual or balance computation left the numeric range.
    #[error("arithmetic overflow while {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: &'static str,
    },

    /// The underlying asset ledger refused the transfer.
    #[error("asset transfer failed: {0}")]
    AssetTransferFailed(#[from] AssetError),

    /// Zero-amount operations are rejected; they are a no-op at best and a
    /// caller bug at worst.
    #[error("amount must be greater than zero")]
    InvalidAmount,
}

impl StakingError {
    /// Shorthand for [`StakingError::ArithmeticOverflow`].
    pub fn overflow(context: &'static str) -> Self {
        StakingError::ArithmeticOverflow { context }
    }

    /// A short, stable name for the error kind. Used as a metrics label and
    /// in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StakingError::InsufficientBalance { .. } => "insufficient_balance",
            StakingError::StakeLocked { .. } => "stake_locked",
            StakingError::NoRewardsAvailable { .. } => "no_rewards_available",
            StakingError::RewardPoolEmpty { .. } => "reward_pool_empty",
            StakingError::Unauthorized { .. } => "unauthorized",
            StakingError::InvalidTimestamp { .. } => "invalid_timestamp",
            StakingError::ArithmeticOverflow { .. } => "arithmetic_overflow",
            StakingError::AssetTransferFailed(_) => "asset_transfer_failed",
            StakingError::InvalidAmount => "invalid_amount",
        }
    }
}

/// Convenience alias used throughout the staking modules.
pub type StakingResult<T> = Result<T, StakingError>;
