//! # Reward Manager Contract
//!
//! The reward ledger. It owns the rate history (a [`CheckpointLog`]) and one
//! [`RewardAccount`] per staker, and it is the custodian of the reward
//! asset: claims are paid from the reward manager's own token balance.
//!
//! ## Who may call what
//!
//! | Operation                         | Capability |
//! |-----------------------------------|------------|
//! | `append_checkpoint`, `set_token_vault` | `ADMIN` |
//! | `settle`, `add_stake_position`, `remove_stake_position`, `reset_pending`, `disburse` | `VAULT` |
//! | views                             | anyone     |
//!
//! ## Settlement
//!
//! A reward account stores the stake it earns on, the cursor up to which its
//! rewards were folded into `pending_reward`, and that pending amount.
//! Before the staked amount changes, the vault settles the account at the
//! *old* amount, so the accrual walk always sees a constant stake.
//!
//! Every mutating operation computes its full result first and only then
//! writes, so an error leaves the account exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use nauh_protocol::asset::AssetLedger;
use nauh_protocol::auth::{CallContext, Role};
use nauh_protocol::error::{StakingError, StakingResult};
use nauh_protocol::rewards::{Accrual, CheckpointLog, RewardCheckpoint, SettlementCursor};
use nauh_protocol::{Address, Amount, Timestamp};

// ---------------------------------------------------------------------------
// RewardAccount
// ---------------------------------------------------------------------------

/// Reward-side state of one staker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardAccount {
    /// Stake this account earns on. Mirrors the vault's staked balance.
    pub staked_balance: Amount,
    /// Where rewards were last settled.
    pub cursor: SettlementCursor,
    /// Settled but unclaimed reward, valid as of `cursor`.
    pub pending_reward: Amount,
}

impl RewardAccount {
    /// Index of the checkpoint this account last settled against.
    pub fn last_settled_checkpoint(&self) -> usize {
        self.cursor.checkpoint
    }
}

/// An account with its accrual folded in, not yet written back.
struct Settled {
    account: RewardAccount,
    delta: Amount,
}

// ---------------------------------------------------------------------------
// RewardManager
// ---------------------------------------------------------------------------

/// Checkpointed reward-rate history plus per-user accrual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardManager {
    /// Address of the reward manager; also the reward custody account.
    address: Address,
    /// The asset rewards are paid in.
    reward_token: Address,
    /// The vault wired by the admin, if any.
    token_vault: Option<Address>,
    /// Rate history. Never empty.
    checkpoints: CheckpointLog,
    /// Reward state per staker.
    accounts: BTreeMap<Address, RewardAccount>,
    /// Sum of all `staked_balance`s. Diagnostics only.
    total_staked: Amount,
}

impl RewardManager {
    /// Deploys the reward manager with checkpoint 0 at `now`.
    pub fn deploy(
        address: Address,
        reward_token: Address,
        initial_rate: Amount,
        now: Timestamp,
    ) -> Self {
        tracing::info!(
            reward_manager = %address,
            %reward_token,
            rate = %initial_rate,
            at = now,
            "reward manager deployed"
        );
        Self {
            address,
            reward_token,
            token_vault: None,
            checkpoints: CheckpointLog::genesis(initial_rate, now),
            accounts: BTreeMap::new(),
            total_staked: 0,
        }
    }

    // -- admin ---------------------------------------------------------------

    /// Appends a checkpoint with `new_rate` effective from `ctx.now`.
    ///
    /// # Errors
    ///
    /// - [`StakingError::Unauthorized`] without `ADMIN`.
    /// - [`StakingError::InvalidTimestamp`] unless `ctx.now` is strictly after
    ///   the latest checkpoint.
    pub fn append_checkpoint(
        &mut self,
        ctx: &CallContext,
        new_rate: Amount,
    ) -> StakingResult<RewardCheckpoint> {
        ctx.require(Role::Admin)?;
        let checkpoint = self.checkpoints.append(new_rate, ctx.now)?;
        tracing::info!(
            index = checkpoint.index,
            rate = %new_rate,
            at = ctx.now,
            admin = %ctx.caller,
            "reward rate checkpoint appended"
        );
        Ok(checkpoint)
    }

    /// Records `vault` as the token vault. Admin-only. Granting the vault its
    /// `VAULT` capability is the role registry's job, not this contract's.
    pub fn set_token_vault(&mut self, ctx: &CallContext, vault: Address) -> StakingResult<()> {
        ctx.require(Role::Admin)?;
        self.token_vault = Some(vault);
        Ok(())
    }

    // -- views ---------------------------------------------------------------

    /// Reward `staked` earns from `from` to `now`. Pure.
    pub fn accrue(
        &self,
        staked: Amount,
        from: SettlementCursor,
        now: Timestamp,
    ) -> StakingResult<Accrual> {
        self.checkpoints.accrue(staked, from, now)
    }

    /// Pending plus not-yet-settled reward for `user` as of `now`.
    pub fn view_reward(&self, user: &Address, now: Timestamp) -> StakingResult<Amount> {
        Ok(self.settled(user, now)?.account.pending_reward)
    }

    /// The stake `user` currently earns on.
    pub fn calculate_user_balance(&self, user: &Address) -> Amount {
        self.account(user).staked_balance
    }

    /// Reward state of `user` (zero-valued if never touched).
    pub fn account(&self, user: &Address) -> RewardAccount {
        self.accounts.get(user).copied().unwrap_or_default()
    }

    /// Checkpoint by index.
    pub fn checkpoint(&self, index: usize) -> Option<&RewardCheckpoint> {
        self.checkpoints.get(index)
    }

    /// The full rate history.
    pub fn checkpoints(&self) -> &CheckpointLog {
        &self.checkpoints
    }

    /// Rate of the latest checkpoint.
    pub fn current_rate(&self) -> Amount {
        self.checkpoints.latest().reward_rate
    }

    /// Sum of every account's stake.
    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// Reward custody address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Asset rewards are paid in.
    pub fn reward_token(&self) -> Address {
        self.reward_token
    }

    /// The wired vault.
    pub fn token_vault(&self) -> Option<Address> {
        self.token_vault
    }

    /// Iterates over all reward accounts.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &RewardAccount)> {
        self.accounts.iter()
    }

    /// Whether `total_staked` equals the sum of all account stakes.
    pub fn total_staked_consistent(&self) -> bool {
        self.accounts
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.staked_balance))
            == Some(self.total_staked)
    }

    // -- vault-only ----------------------------------------------------------

    /// Folds accrued reward into `pending_reward` and advances the cursor.
    /// Returns the amount folded in.
    pub fn settle(&mut self, ctx: &CallContext, user: Address) -> StakingResult<Amount> {
        ctx.require(Role::Vault)?;
        let Settled { account, delta } = self.settled(&user, ctx.now)?;
        self.accounts.insert(user, account);
        tracing::debug!(%user, delta = %delta, pending = %account.pending_reward, "rewards settled");
        Ok(delta)
    }

    /// Settles `user` at the old stake, then adds `amount` to it.
    pub fn add_stake_position(
        &mut self,
        ctx: &CallContext,
        user: Address,
        amount: Amount,
    ) -> StakingResult<()> {
        ctx.require(Role::Vault)?;
        let Settled { mut account, .. } = self.settled(&user, ctx.now)?;

        account.staked_balance = account
            .staked_balance
            .checked_add(amount)
            .ok_or(StakingError::overflow("adding stake position"))?;
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(StakingError::overflow("updating total staked"))?;

        self.accounts.insert(user, account);
        self.total_staked = total;
        Ok(())
    }

    /// Settles `user` at the old stake, then removes `amount` from it.
    pub fn remove_stake_position(
        &mut self,
        ctx: &CallContext,
        user: Address,
        amount: Amount,
    ) -> StakingResult<()> {
        ctx.require(Role::Vault)?;
        let Settled { mut account, .. } = self.settled(&user, ctx.now)?;

        if amount > account.staked_balance {
            return Err(StakingError::InsufficientBalance {
                available: account.staked_balance,
                requested: amount,
            });
        }
        account.staked_balance -= amount;
        let total = self
            .total_staked
            .checked_sub(amount)
            .ok_or(StakingError::overflow("updating total staked"))?;

        self.accounts.insert(user, account);
        self.total_staked = total;
        Ok(())
    }

    /// Zeroes `user`'s pending reward. Returns what was pending.
    pub fn reset_pending(&mut self, ctx: &CallContext, user: Address) -> StakingResult<Amount> {
        ctx.require(Role::Vault)?;
        let previous = match self.accounts.get_mut(&user) {
            Some(account) => std::mem::take(&mut account.pending_reward),
            None => 0,
        };
        Ok(previous)
    }

    /// Settles `user` and pays out everything pending from reward custody.
    ///
    /// # Errors
    ///
    /// - [`StakingError::NoRewardsAvailable`] if nothing is pending.
    /// - [`StakingError::RewardPoolEmpty`] if custody cannot cover it.
    /// - [`StakingError::AssetTransferFailed`] if the ledger refuses.
    ///
    /// On any error the account is left untouched: settlement is only
    /// written once the transfer has gone through.
    pub fn disburse<L: AssetLedger>(
        &mut self,
        ctx: &CallContext,
        ledger: &mut L,
        user: Address,
    ) -> StakingResult<Amount> {
        ctx.require(Role::Vault)?;
        let Settled { account, .. } = self.settled(&user, ctx.now)?;

        let amount = account.pending_reward;
        if amount == 0 {
            return Err(StakingError::NoRewardsAvailable { user });
        }

        let available = ledger.balance_of(&self.address);
        if available < amount {
            tracing::warn!(%user, required = %amount, available = %available, "reward pool cannot cover claim");
            return Err(StakingError::RewardPoolEmpty {
                available,
                required: amount,
            });
        }

        ledger.transfer(self.address, user, amount)?;

        self.accounts.insert(user, account);
        self.reset_pending(ctx, user)?;
        tracing::info!(%user, %amount, "rewards disbursed");
        Ok(amount)
    }

    fn settled(&self, user: &Address, now: Timestamp) -> StakingResult<Settled> {
        let mut account = self.account(user);
        let accrual = self
            .checkpoints
            .accrue(account.staked_balance, account.cursor, now)?;
        account.pending_reward = account
            .pending_reward
            .checked_add(accrual.reward)
            .ok_or(StakingError::overflow("adding accrual to pending reward"))?;
        account.cursor = accrual.cursor;
        Ok(Settled {
            account,
            delta: accrual.reward,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
