//! # Reward Checkpoint Log
//!
//! The reward rate is a step function of time. Each step is a
//! [`RewardCheckpoint`]: "from `timestamp` on, every staked unit earns
//! `reward_rate` per second." The [`CheckpointLog`] is the append-only
//! history of those steps.
//!
//! ```text
//! rate
//!  │        cp1 ┌──────────┐
//!  │ cp0 ───────┘          │ cp2 ┌────────── (open until now)
//!  │                       └─────┘
//!  └────┬───────┬──────────┬─────┬──────────► t
//!      t0      t1         t2    now
//! ```
//!
//! ## Accrual Walk
//!
//! A user's settlement position is a [`SettlementCursor`]: the index of the
//! checkpoint in effect when they last settled, plus the instant they
//! settled. [`CheckpointLog::accrue`] walks from that checkpoint forward and
//! sums `rate_i × overlap_i × staked`, where `overlap_i` is the part of
//! interval `i` that falls inside `[cursor.timestamp, now)`. Only the
//! checkpoints appended since the last settlement are visited.
//!
//! The walk assumes `staked` was constant over the window, so callers must
//! settle *before* changing a stake amount.

use serde::{Deserialize, Serialize};

use crate::error::{StakingError, StakingResult};
use crate::time::Timestamp;
use crate::Amount;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An immutable reward-rate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCheckpoint {
    /// Position in the log. 0 is the genesis checkpoint.
    pub index: usize,
    /// When this rate took effect.
    pub timestamp: Timestamp,
    /// Reward units per staked unit per second.
    pub reward_rate: Amount,
}

/// Where a reward account last settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementCursor {
    /// Index of the checkpoint in effect at `timestamp`.
    pub checkpoint: usize,
    /// The instant accrual was last folded into the pending reward.
    pub timestamp: Timestamp,
}

/// Result of an accrual walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    /// Reward earned over the walked window.
    pub reward: Amount,
    /// Cursor to store after settling this accrual.
    pub cursor: SettlementCursor,
}

// ---------------------------------------------------------------------------
// CheckpointLog
// ---------------------------------------------------------------------------

/// Append-only, never-empty sequence of checkpoints with strictly increasing
/// timestamps.
///
/// Deserialization re-validates those invariants, so a tampered snapshot
/// cannot smuggle in an out-of-order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RewardCheckpoint>", into = "Vec<RewardCheckpoint>")]
pub struct CheckpointLog {
    checkpoints: Vec<RewardCheckpoint>,
}

impl CheckpointLog {
    /// Creates a log holding only checkpoint 0.
    pub fn genesis(reward_rate: Amount, at: Timestamp) -> Self {
        Self {
            checkpoints: vec![RewardCheckpoint {
                index: 0,
                timestamp: at,
                reward_rate,
            }],
        }
    }

    /// Appends a new rate effective from `now`.
    ///
    /// # Errors
    ///
    /// [`StakingError::InvalidTimestamp`] unless `now` is strictly after the
    /// latest checkpoint.
    pub fn append(&mut self, reward_rate: Amount, now: Timestamp) -> StakingResult<RewardCheckpoint> {
        let latest = self.latest();
        if now <= latest.timestamp {
            return Err(StakingError::InvalidTimestamp {
                now,
                latest: latest.timestamp,
            });
        }

        let checkpoint = RewardCheckpoint {
            index: self.checkpoints.len(),
            timestamp: now,
            reward_rate,
        };
        self.checkpoints.push(checkpoint);
        Ok(checkpoint)
    }

    /// The most recent checkpoint.
    pub fn latest(&self) -> &RewardCheckpoint {
        // Construction and deserialization both guarantee at least one entry.
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    /// Checkpoint by index.
    pub fn get(&self, index: usize) -> Option<&RewardCheckpoint> {
        self.checkpoints.get(index)
    }

    /// Number of checkpoints, genesis included.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Always `false`; the log holds at least the genesis checkpoint.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// All checkpoints in index order.
    pub fn as_slice(&self) -> &[RewardCheckpoint] {
        &self.checkpoints
    }

    /// The rate in effect at `at`, or `None` before genesis.
    pub fn rate_at(&self, at: Timestamp) -> Option<Amount> {
        let idx = self.checkpoints.partition_point(|cp| cp.timestamp <= at);
        idx.checked_sub(1).map(|i| self.checkpoints[i].reward_rate)
    }

    /// The cursor a settlement at `now` would store.
    pub fn cursor_at(&self, now: Timestamp) -> SettlementCursor {
        SettlementCursor {
            checkpoint: self.latest().index,
            timestamp: now,
        }
    }

    /// Computes the reward `staked` earned between `from` and `now`.
    ///
    /// # Errors
    ///
    /// - [`StakingError::InvalidTimestamp`] if `now` precedes the latest
    ///   checkpoint or the cursor's settlement time.
    /// - [`StakingError::ArithmeticOverflow`] if any term or the running sum
    ///   leaves `u128`.
    pub fn accrue(
        &self,
        staked: Amount,
        from: SettlementCursor,
        now: Timestamp,
    ) -> StakingResult<Accrual> {
        let latest = self.latest().timestamp;
        if now < latest {
            return Err(StakingError::InvalidTimestamp { now, latest });
        }
        if now < from.timestamp {
            return Err(StakingError::InvalidTimestamp {
                now,
                latest: from.timestamp,
            });
        }

        let cursor = self.cursor_at(now);
        if staked == 0 {
            return Ok(Accrual { reward: 0, cursor });
        }

        let mut reward: Amount = 0;
        for (i, checkpoint) in self.checkpoints.iter().enumerate().skip(from.checkpoint) {
            let interval_end = self
                .checkpoints
                .get(i + 1)
                .map(|next| next.timestamp)
                .unwrap_or(now);

            let start = checkpoint.timestamp.max(from.timestamp);
            let end = interval_end.min(now);
            if end <= start {
                continue;
            }

            let term = checkpoint
                .reward_rate
                .checked_mul(Amount::from(end - start))
                .and_then(|v| v.checked_mul(staked))
                .ok_or(StakingError::overflow("accruing checkpoint interval"))?;
            reward = reward
                .checked_add(term)
                .ok_or(StakingError::overflow("summing accrued reward"))?;
        }

        Ok(Accrual { reward, cursor })
    }
}

impl TryFrom<Vec<RewardCheckpoint>> for CheckpointLog {
    type Error = String;

    fn try_from(checkpoints: Vec<RewardCheckpoint>) -> Result<Self, Self::Error> {
        if checkpoints.is_empty() {
            return Err("checkpoint log must contain a genesis checkpoint".into());
        }
        for (i, cp) in checkpoints.iter().enumerate() {
            if cp.index != i {
                return Err(format!("checkpoint at position {i} has index {}", cp.index));
            }
            if i > 0 && cp.timestamp <= checkpoints[i - 1].timestamp {
                return Err(format!(
                    "checkpoint {i} timestamp {} does not follow {}",
                    cp.timestamp,
                    checkpoints[i - 1].timestamp
                ));
            }
        }
        Ok(Self { checkpoints })
    }
}

impl From<CheckpointLog> for Vec<RewardCheckpoint> {
    fn from(log: CheckpointLog) -> Self {
        log.checkpoints
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
