//! # Rewards Module
//!
//! Time-weighted reward accrual over a history of rate changes.
//!
//! ```text
//! checkpoint.rs — RewardCheckpoint, CheckpointLog, SettlementCursor, accrual walk
//! ```
//!
//! Accrual is `rate × own stake × elapsed seconds`.
//! There is no pro-rata split of a shared emission, so one user's stake
//! never changes another user's earnings.

pub mod checkpoint;

pub use checkpoint::{Accrual, CheckpointLog, RewardCheckpoint, SettlementCursor};
