//! # Nauh Staking Contracts
//!
//! The stateful half of the staking engine:
//!
//! - **NauhToken** — the fungible asset users deposit and are rewarded in.
//! - **RewardManager** — checkpointed reward-rate history and per-user
//!   settlement of time-weighted rewards. Also the reward custodian.
//! - **TokenVault** — deposit, stake, unstake, withdraw and claim, with a
//!   lock window on staked funds.
//! - **StakingLedger** — wires the above with the role registry and the
//!   event log, and runs every operation as an all-or-nothing transaction.
//! - **StakingService** — the same ledger behind a read/write lock, with a
//!   clock, metrics and snapshot persistence.
//!
//! ## Design Principles
//!
//! 1. All monetary operations are checked. Overflow is an error.
//! 2. Contracts check the caller's capabilities before touching state, and
//!    compute their full result before writing any of it.
//! 3. Every type that holds state is serializable (serde), so the whole
//!    ledger can be snapshotted and restored bit-for-bit.

pub mod events;
pub mod ledger;
pub mod metrics;
pub mod nauh_token;
pub mod reward_manager;
pub mod service;
pub mod token_vault;

pub use events::{EventKind, EventLog, LedgerEvent};
pub use ledger::{DeployError, InvariantViolation, StakingLedger};
pub use metrics::VaultMetrics;
pub use nauh_token::NauhToken;
pub use reward_manager::{RewardAccount, RewardManager};
pub use service::{ServiceError, StakingService};
pub use token_vault::{StakePosition, TokenVault};
