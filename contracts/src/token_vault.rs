//! # Token Vault Contract
//!
//! The user-facing state machine. Users deposit the staking asset into vault
//! custody, stake part of it to start earning, unstake once the lock window
//! has passed, and withdraw what is not staked.
//!
//! ## Position Lifecycle
//!
//! ```text
//!              deposit                stake
//!   wallet ───────────► deposited ───────────► staked
//!          ◄───────────           ◄───────────
//!             withdraw               unstake
//!          (unstaked only)     (after stake_timestamp + lock)
//! ```
//!
//! Staking never moves tokens; it only reclassifies deposited funds. Every
//! stake change is preceded by a settlement in the [`RewardManager`], which
//! the vault reaches with its own `VAULT` capability.
//!
//! Each operation validates, then performs the single external effect
//! (asset transfer or reward-ledger update), then writes the position. If
//! the external effect fails the position is untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use nauh_protocol::asset::AssetLedger;
use nauh_protocol::auth::{CallContext, Capabilities, Role};
use nauh_protocol::error::{StakingError, StakingResult};
use nauh_protocol::{Address, Amount, Timestamp};

use crate::reward_manager::RewardManager;

/// Vault-side record of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StakePosition {
    /// Total held in custody for the user, staked or not.
    pub deposited_balance: Amount,
    /// Portion of `deposited_balance` that is staked.
    pub staked_balance: Amount,
    /// Time of the latest stake. The lock window runs from here.
    pub stake_timestamp: Timestamp,
}

impl StakePosition {
    /// Deposited funds that are not staked.
    pub fn available(&self) -> Amount {
        self.deposited_balance.saturating_sub(self.staked_balance)
    }
}

/// Custody and lock bookkeeping for stakers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenVault {
    address: Address,
    lock_duration: Timestamp,
    positions: BTreeMap<Address, StakePosition>,
}

impl TokenVault {
    /// Deploys an empty vault.
    pub fn deploy(address: Address, lock_duration: Timestamp) -> Self {
        tracing::info!(vault = %address, lock_duration, "token vault deployed");
        Self {
            address,
            lock_duration,
            positions: BTreeMap::new(),
        }
    }

    /// The vault's account address. Custody balance lives here.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Lock window in seconds.
    pub fn lock_duration(&self) -> Timestamp {
        self.lock_duration
    }

    /// Position of `user` (zero-valued if never touched).
    pub fn position(&self, user: &Address) -> StakePosition {
        self.positions.get(user).copied().unwrap_or_default()
    }

    /// Deposited balance of `user`.
    pub fn balances(&self, user: &Address) -> Amount {
        self.position(user).deposited_balance
    }

    /// Staked balance of `user`.
    pub fn staked_balances(&self, user: &Address) -> Amount {
        self.position(user).staked_balance
    }

    /// First instant at which `user` may unstake.
    pub fn unlock_time(&self, user: &Address) -> StakingResult<Timestamp> {
        self.position(user)
            .stake_timestamp
            .checked_add(self.lock_duration)
            .ok_or(StakingError::overflow("computing unlock time"))
    }

    /// Iterates over all positions.
    pub fn positions(&self) -> impl Iterator<Item = (&Address, &StakePosition)> {
        self.positions.iter()
    }

    /// Sum of all deposited balances; what the vault should hold in custody.
    pub fn total_deposited(&self) -> Option<Amount> {
        self.positions
            .values()
            .try_fold(0u128, |acc, p| acc.checked_add(p.deposited_balance))
    }

    // -- operations ----------------------------------------------------------

    /// Pulls `amount` from the caller into custody. The caller must have
    /// approved the vault for at least `amount`.
    pub fn deposit<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        token: &mut L,
        amount: Amount,
    ) -> StakingResult<()> {
        let user = ctx.caller;
        if user == self.address {
            return Err(StakingError::Unauthorized {
                caller: user,
                role: Role::Admin,
            });
        }
        let mut position = self.position(&user);
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        position.deposited_balance = position
            .deposited_balance
            .checked_add(amount)
            .ok_or(StakingError::overflow("adding deposit"))?;

        token.transfer_from(self.address, user, self.address, amount)?;

        self.positions.insert(user, position);
        tracing::info!(%user, %amount, deposited = %position.deposited_balance, "deposit");
        Ok(())
    }

    /// Returns `amount` of unstaked funds to the caller.
    pub fn withdraw<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        token: &mut L,
        amount: Amount,
    ) -> StakingResult<()> {
        let user = ctx.caller;
        let mut position = self.position(&user);
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let available = position.available();
        if amount > available {
            return Err(StakingError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        position.deposited_balance -= amount;

        token.transfer(self.address, user, amount)?;

        self.positions.insert(user, position);
        tracing::info!(%user, %amount, deposited = %position.deposited_balance, "withdraw");
        Ok(())
    }

    /// Stakes `amount` of the caller's deposited funds and restarts the lock
    /// window.
    ///
    /// `granted` is the vault's own capability set, used to call into the
    /// reward manager.
    pub fn stake(
        &mut self,
        ctx: &CallContext,
        granted: Capabilities,
        rewards: &mut RewardManager,
        amount: Amount,
    ) -> StakingResult<()> {
        let user = ctx.caller;
        let mut position = self.position(&user);
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let available = position.available();
        if amount > available {
            return Err(StakingError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        position.staked_balance += amount;
        position.stake_timestamp = ctx.now;

        rewards.add_stake_position(&ctx.delegate(self.address, granted), user, amount)?;

        self.positions.insert(user, position);
        tracing::info!(
            %user,
            %amount,
            staked = %position.staked_balance,
            unlocks_at = position.stake_timestamp.saturating_add(self.lock_duration),
            "stake"
        );
        Ok(())
    }

    /// Releases `amount` of stake back to the deposited balance. Only after
    /// the lock window has elapsed.
    pub fn unstake(
        &mut self,
        ctx: &CallContext,
        granted: Capabilities,
        rewards: &mut RewardManager,
        amount: Amount,
    ) -> StakingResult<()> {
        let user = ctx.caller;
        let mut position = self.position(&user);
        if amount == 0 {
            return Err(StakingError::InvalidAmount);
        }
        let unlocks_at = self.unlock_time(&user)?;
        if ctx.now < unlocks_at {
            return Err(StakingError::StakeLocked {
                unlocks_at,
                now: ctx.now,
            });
        }
        if amount > position.staked_balance {
            return Err(StakingError::InsufficientBalance {
                available: position.staked_balance,
                requested: amount,
            });
        }
        position.staked_balance -= amount;

        rewards.remove_stake_position(&ctx.delegate(self.address, granted), user, amount)?;

        self.positions.insert(user, position);
        tracing::info!(%user, %amount, staked = %position.staked_balance, "unstake");
        Ok(())
    }

    /// Settles and pays out the caller's pending reward from reward
    /// custody. Returns the amount paid.
    pub fn claim_rewards<L: AssetLedger>(
        &self,
        ctx: &CallContext,
        granted: Capabilities,
        rewards: &mut RewardManager,
        token: &mut L,
    ) -> StakingResult<Amount> {
        let user = ctx.caller;
        let amount = rewards.disburse(&ctx.delegate(self.address, granted), token, user)?;
        tracing::info!(%user, %amount, "rewards claimed");
        Ok(amount)
    }

    /// Reward `user` could claim at `now`.
    pub fn view_rewards(
        &self,
        rewards: &RewardManager,
        user: &Address,
        now: Timestamp,
    ) -> StakingResult<Amount> {
        rewards.view_reward(user, now)
    }
}
