//! # Staking Ledger
//!
//! Wires the three contracts, the role registry and the event log into one
//! deployable unit, and is the only place where a raw caller address is
//! turned into a [`CallContext`].
//!
//! ## Transactions
//!
//! Every mutating entry point stages a copy of the contract state (role
//! registry, token, reward manager and vault) and runs the operation on it.
//! The copy replaces the live state only if the operation returned `Ok`, and
//! only then is its event appended. A failure anywhere (a refused transfer
//! after a settlement, an overflow in the last step) therefore leaves
//! balances, checkpoints, cursors and the event log exactly as they were.
//! The event log itself is never copied.
//!
//! ## Contract accounts
//!
//! The token, reward manager and vault addresses hold balances but never act
//! as users. Any user operation, approval or outgoing transfer naming one of
//! them as the caller fails with `Unauthorized`. Transfers *to* the reward
//! manager stay open, since that is how the reward pool is funded.
//!
//! ## Deployment
//!
//! ```text
//! deploy(config, admin, now)
//!   ├─ NauhToken      supply minted to admin
//!   ├─ RewardManager  checkpoint 0 = config.initial_reward_rate @ now
//!   ├─ TokenVault     lock = config.lock_duration
//!   └─ optional       admin → reward custody: config.initial_reward_funding
//!
//! set_token_vault(admin, vault)   grants VAULT; until then stake/unstake/claim
//!                                 fail with Unauthorized
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nauh_protocol::asset::AssetLedger;
use nauh_protocol::auth::{AccessControl, CallContext, Role};
use nauh_protocol::config::{
    ConfigError, StakingConfig, REWARD_MANAGER_LABEL, TOKEN_LABEL, TOKEN_VAULT_LABEL,
};
use nauh_protocol::error::{StakingError, StakingResult};
use nauh_protocol::rewards::RewardCheckpoint;
use nauh_protocol::{Address, Amount, Timestamp};

use crate::events::{EventKind, EventLog};
use crate::nauh_token::NauhToken;
use crate::reward_manager::RewardManager;
use crate::token_vault::TokenVault;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while deploying a ledger.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The configuration failed validation.
    #[error("invalid staking config: {0}")]
    Config(#[from] ConfigError),

    /// A genesis step (reward funding) failed.
    #[error("genesis failed: {0}")]
    Staking(#[from] StakingError),
}

/// A broken cross-contract invariant found by [`StakingLedger::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A position has more staked than deposited.
    #[error("{user}: staked {staked} exceeds deposited {deposited}")]
    StakeExceedsDeposit {
        /// The account.
        user: Address,
        /// Vault-side staked balance.
        staked: Amount,
        /// Vault-side deposited balance.
        deposited: Amount,
    },

    /// Vault and reward manager disagree on a user's stake.
    #[error("{user}: vault records {vault} staked, reward manager {rewards}")]
    MirrorMismatch {
        /// The account.
        user: Address,
        /// Staked balance according to the vault.
        vault: Amount,
        /// Staked balance according to the reward manager.
        rewards: Amount,
    },

    /// `total_staked` is not the sum of the reward accounts.
    #[error("reward manager total_staked is out of sync with its accounts")]
    TotalStakedMismatch,

    /// The vault holds less than it owes depositors.
    #[error("vault custody {held} is below total deposits {owed}")]
    CustodyShortfall {
        /// Token balance of the vault address.
        held: Amount,
        /// Sum of deposited balances.
        owed: Amount,
    },

    /// Token balances no longer sum to the total supply.
    #[error("token balances do not sum to total supply")]
    SupplyMismatch,
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// The state a transaction stages and commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Contracts {
    access: AccessControl,
    token: NauhToken,
    rewards: RewardManager,
    vault: TokenVault,
}

impl Contracts {
    fn is_contract_account(&self, account: &Address) -> bool {
        *account == self.token.address()
            || *account == self.rewards.address()
            || *account == self.vault.address()
    }

    /// Contract accounts never act as users.
    fn reject_contract_account(&self, account: Address) -> StakingResult<()> {
        if self.is_contract_account(&account) {
            return Err(StakingError::Unauthorized {
                caller: account,
                role: Role::Admin,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StakingLedger
// ---------------------------------------------------------------------------

/// The complete staking system state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingLedger {
    config: StakingConfig,
    admin: Address,
    contracts: Contracts,
    events: EventLog,
}

impl StakingLedger {
    /// Deploys token, reward manager and vault at `now`, with `admin` as the
    /// initial `ADMIN` and token holder.
    pub fn deploy(
        config: StakingConfig,
        admin: Address,
        now: Timestamp,
    ) -> Result<Self, DeployError> {
        config.validate()?;

        let token_addr = Address::derive(TOKEN_LABEL);
        let mut token = NauhToken::deploy(token_addr, admin, config.initial_supply);
        let rewards = RewardManager::deploy(
            Address::derive(REWARD_MANAGER_LABEL),
            token_addr,
            config.initial_reward_rate,
            now,
        );
        let vault = TokenVault::deploy(Address::derive(TOKEN_VAULT_LABEL), config.lock_duration);

        if config.initial_reward_funding > 0 {
            token
                .transfer(admin, rewards.address(), config.initial_reward_funding)
                .map_err(StakingError::from)?;
        }

        tracing::info!(
            %admin,
            token = %token_addr,
            reward_manager = %rewards.address(),
            vault = %vault.address(),
            funding = %config.initial_reward_funding,
            "staking ledger deployed"
        );

        Ok(Self {
            admin,
            config,
            contracts: Contracts {
                access: AccessControl::with_admin(admin),
                token,
                rewards,
                vault,
            },
            events: EventLog::new(),
        })
    }

    // -- accessors -----------------------------------------------------------

    /// Deploy-time configuration.
    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// The deploying admin.
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Role registry.
    pub fn access(&self) -> &AccessControl {
        &self.contracts.access
    }

    /// The staking asset.
    pub fn token(&self) -> &NauhToken {
        &self.contracts.token
    }

    /// The reward ledger.
    pub fn rewards(&self) -> &RewardManager {
        &self.contracts.rewards
    }

    /// The vault state machine.
    pub fn vault(&self) -> &TokenVault {
        &self.contracts.vault
    }

    /// Committed events.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Whether `account` is the token, reward manager or vault address.
    pub fn is_contract_account(&self, account: &Address) -> bool {
        self.contracts.is_contract_account(account)
    }

    /// Builds the call context for `caller` at `now`.
    pub fn context_for(&self, caller: Address, now: Timestamp) -> CallContext {
        self.contracts.access.context_for(caller, now)
    }

    // -- transaction boundary ------------------------------------------------

    /// Runs `op` against a staged copy of the contracts and commits it only
    /// on success.
    fn transact<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Contracts) -> StakingResult<T>,
    ) -> StakingResult<T> {
        let mut staged = self.contracts.clone();
        match op(&mut staged) {
            Ok(value) => {
                self.contracts = staged;
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(op = name, kind = err.kind(), error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    // -- user operations -----------------------------------------------------

    /// Moves `amount` from `user` into vault custody.
    pub fn deposit(&mut self, user: Address, amount: Amount, now: Timestamp) -> StakingResult<()> {
        self.transact("deposit", |c| {
            c.reject_contract_account(user)?;
            let ctx = c.access.context_for(user, now);
            c.vault.deposit(&ctx, &mut c.token, amount)
        })?;
        self.events.record(EventKind::Deposited, user, amount, now);
        Ok(())
    }

    /// Returns `amount` of unstaked funds to `user`.
    pub fn withdraw(&mut self, user: Address, amount: Amount, now: Timestamp) -> StakingResult<()> {
        self.transact("withdraw", |c| {
            c.reject_contract_account(user)?;
            let ctx = c.access.context_for(user, now);
            c.vault.withdraw(&ctx, &mut c.token, amount)
        })?;
        self.events.record(EventKind::Withdrawn, user, amount, now);
        Ok(())
    }

    /// Stakes `amount` of `user`'s deposit.
    pub fn stake(&mut self, user: Address, amount: Amount, now: Timestamp) -> StakingResult<()> {
        self.transact("stake", |c| {
            c.reject_contract_account(user)?;
            let ctx = c.access.context_for(user, now);
            let granted = c.access.capabilities_of(&c.vault.address());
            c.vault.stake(&ctx, granted, &mut c.rewards, amount)
        })?;
        self.events.record(EventKind::Staked, user, amount, now);
        Ok(())
    }

    /// Unstakes `amount` for `user` once the lock has elapsed.
    pub fn unstake(&mut self, user: Address, amount: Amount, now: Timestamp) -> StakingResult<()> {
        self.transact("unstake", |c| {
            c.reject_contract_account(user)?;
            let ctx = c.access.context_for(user, now);
            let granted = c.access.capabilities_of(&c.vault.address());
            c.vault.unstake(&ctx, granted, &mut c.rewards, amount)
        })?;
        self.events.record(EventKind::Unstaked, user, amount, now);
        Ok(())
    }

    /// Pays out `user`'s pending reward. Returns the amount paid.
    pub fn claim_rewards(&mut self, user: Address, now: Timestamp) -> StakingResult<Amount> {
        let amount = self.transact("claim_rewards", |c| {
            c.reject_contract_account(user)?;
            let ctx = c.access.context_for(user, now);
            let granted = c.access.capabilities_of(&c.vault.address());
            c.vault
                .claim_rewards(&ctx, granted, &mut c.rewards, &mut c.token)
        })?;
        self.events.record(EventKind::RewardClaimed, user, amount, now);
        Ok(amount)
    }

    /// Reward `user` could claim at `now`.
    pub fn view_rewards(&self, user: &Address, now: Timestamp) -> StakingResult<Amount> {
        self.contracts
            .vault
            .view_rewards(&self.contracts.rewards, user, now)
    }

    /// Sets `spender`'s allowance over `owner`'s tokens.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> StakingResult<()> {
        self.transact("approve", |c| {
            c.reject_contract_account(owner)?;
            c.token.approve(owner, spender, amount);
            Ok(())
        })
    }

    /// Plain token transfer from `from`. Funding reward custody is a
    /// transfer to [`RewardManager::address`].
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> StakingResult<()> {
        self.transact("transfer", |c| {
            c.reject_contract_account(from)?;
            c.token.transfer(from, to, amount)?;
            Ok(())
        })
    }

    // -- admin operations ----------------------------------------------------

    /// Appends a reward-rate checkpoint effective at `now`.
    pub fn update_reward_rate(
        &mut self,
        caller: Address,
        new_rate: Amount,
        now: Timestamp,
    ) -> StakingResult<RewardCheckpoint> {
        let checkpoint = self.transact("update_reward_rate", |c| {
            let ctx = c.access.context_for(caller, now);
            c.rewards.append_checkpoint(&ctx, new_rate)
        })?;
        self.events.record(
            EventKind::RewardRateUpdated {
                checkpoint: checkpoint.index,
            },
            caller,
            new_rate,
            now,
        );
        Ok(checkpoint)
    }

    /// Wires `vault` as the token vault on the token and the reward manager
    /// and grants it `VAULT`. Only the deployed vault's address makes the
    /// vault operations work; any other address merely holds the role.
    pub fn set_token_vault(
        &mut self,
        caller: Address,
        vault: Address,
        now: Timestamp,
    ) -> StakingResult<()> {
        self.transact("set_token_vault", |c| {
            let ctx = c.access.context_for(caller, now);
            c.token.set_token_vault(&ctx, vault)?;
            c.rewards.set_token_vault(&ctx, vault)?;
            c.access.grant_role(&ctx, Role::Vault, vault)?;
            Ok(())
        })?;
        self.events.record(EventKind::TokenVaultSet, vault, 0, now);
        Ok(())
    }

    /// Grants `role` to `account`. Admin-only.
    pub fn grant_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
        now: Timestamp,
    ) -> StakingResult<bool> {
        self.transact("grant_role", |c| {
            let ctx = c.access.context_for(caller, now);
            c.access.grant_role(&ctx, role, account)
        })
    }

    /// Revokes `role` from `account`. Admin-only.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
        now: Timestamp,
    ) -> StakingResult<bool> {
        self.transact("revoke_role", |c| {
            let ctx = c.access.context_for(caller, now);
            c.access.revoke_role(&ctx, role, account)
        })
    }

    // -- audit ---------------------------------------------------------------

    /// Checks every cross-contract invariant. Empty means healthy.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let Contracts {
            token,
            rewards,
            vault,
            ..
        } = &self.contracts;
        let mut violations = Vec::new();

        for (user, position) in vault.positions() {
            if position.staked_balance > position.deposited_balance {
                violations.push(InvariantViolation::StakeExceedsDeposit {
                    user: *user,
                    staked: position.staked_balance,
                    deposited: position.deposited_balance,
                });
            }
        }

        let users = vault
            .positions()
            .map(|(u, _)| *u)
            .chain(rewards.accounts().map(|(u, _)| *u))
            .collect::<std::collections::BTreeSet<_>>();
        for user in users {
            let staked = vault.staked_balances(&user);
            let mirrored = rewards.calculate_user_balance(&user);
            if staked != mirrored {
                violations.push(InvariantViolation::MirrorMismatch {
                    user,
                    vault: staked,
                    rewards: mirrored,
                });
            }
        }

        if !rewards.total_staked_consistent() {
            violations.push(InvariantViolation::TotalStakedMismatch);
        }

        let held = token.balance_of(&vault.address());
        match vault.total_deposited() {
            Some(owed) if held >= owed => {}
            owed => violations.push(InvariantViolation::CustodyShortfall {
                held,
                owed: owed.unwrap_or(Amount::MAX),
            }),
        }

        if token.circulating() != Some(token.total_supply()) {
            violations.push(InvariantViolation::SupplyMismatch);
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::derive("admin")
    }

    fn config() -> StakingConfig {
        StakingConfig {
            initial_reward_rate: 1,
            lock_duration: 100,
            initial_supply: 1_000_000,
            initial_reward_funding: 10_000,
        }
    }

    fn ledger() -> StakingLedger {
        StakingLedger::deploy(config(), admin(), 0).unwrap()
    }

    #[test]
    fn deploy_funds_reward_custody() {
        let l = ledger();
        assert_eq!(l.token().balance_of(&l.rewards().address()), 10_000);
        assert_eq!(l.token().balance_of(&admin()), 990_000);
        assert!(l.access().has_role(Role::Admin, &admin()));
        assert!(l.check_invariants().is_empty());
    }

    #[test]
    fn deploy_rejects_invalid_config() {
        let mut cfg = config();
        cfg.initial_reward_funding = cfg.initial_supply + 1;
        assert!(matches!(
            StakingLedger::deploy(cfg, admin(), 0),
            Err(DeployError::Config(_))
        ));
    }

    #[test]
    fn stake_before_vault_wiring_is_unauthorized() {
        let mut l = ledger();
        let vault = l.vault().address();
        l.approve(admin(), vault, 100).unwrap();
        l.deposit(admin(), 100, 1).unwrap();
        assert!(matches!(
            l.stake(admin(), 50, 2),
            Err(StakingError::Unauthorized { role: Role::Vault, .. })
        ));
        assert_eq!(l.vault().staked_balances(&admin()), 0);
    }

    #[test]
    fn set_token_vault_records_everywhere() {
        let mut l = ledger();
        let vault = l.vault().address();
        l.set_token_vault(admin(), vault, 1).unwrap();
        assert_eq!(l.token().token_vault(), Some(vault));
        assert_eq!(l.rewards().token_vault(), Some(vault));
        assert!(l.access().has_role(Role::Vault, &vault));
        assert_eq!(l.events().last().unwrap().kind, EventKind::TokenVaultSet);
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let mut l = ledger();
        let before = l.events().len();
        let user = Address::derive("mallory");
        assert!(l.update_reward_rate(user, 5, 10).is_err());
        assert_eq!(l.events().len(), before);
        assert_eq!(l.rewards().checkpoints().len(), 1);
    }

    #[test]
    fn invariant_check_flags_mirror_mismatch() {
        let mut l = ledger();
        let vault = l.vault().address();
        let granted = nauh_protocol::auth::Capabilities::of(&[Role::Vault]);
        let ctx = CallContext::with_capabilities(vault, 1, granted);
        l.contracts
            .rewards
            .add_stake_position(&ctx, Address::derive("ghost"), 5)
            .unwrap();
        assert!(l
            .check_invariants()
            .iter()
            .any(|v| matches!(v, InvariantViolation::MirrorMismatch { .. })));
    }

    #[test]
    fn rejected_operation_keeps_committed_events() {
        let mut l = ledger();
        let vault = l.vault().address();
        l.set_token_vault(admin(), vault, 1).unwrap();
        l.approve(admin(), vault, 100).unwrap();
        l.deposit(admin(), 100, 2).unwrap();
        let committed = l.events().len();

        assert!(l.withdraw(admin(), 101, 3).is_err());
        assert_eq!(l.events().len(), committed);

        l.withdraw(admin(), 40, 4).unwrap();
        let last = l.events().last().unwrap();
        assert_eq!(last.kind, EventKind::Withdrawn);
        assert_eq!(last.amount, 40);
        assert_eq!(l.events().len(), committed + 1);
        assert_eq!(l.vault().balances(&admin()), 60);
    }

    #[test]
    fn contract_accounts_cannot_act_as_users() {
        let mut l = ledger();
        let token = l.token().address();
        let rewards = l.rewards().address();
        let vault = l.vault().address();
        assert!(l.is_contract_account(&rewards));
        assert!(!l.is_contract_account(&admin()));

        for account in [token, rewards, vault] {
            assert!(matches!(
                l.approve(account, vault, 1),
                Err(StakingError::Unauthorized { caller, .. }) if caller == account
            ));
            assert!(matches!(
                l.transfer(account, admin(), 1),
                Err(StakingError::Unauthorized { .. })
            ));
            assert!(matches!(
                l.deposit(account, 1, 1),
                Err(StakingError::Unauthorized { .. })
            ));
        }
        assert_eq!(l.token().balance_of(&rewards), 10_000);

        // Funding the reward pool is still a transfer to the manager.
        l.transfer(admin(), rewards, 500).unwrap();
        assert_eq!(l.token().balance_of(&rewards), 10_500);
        assert!(l.check_invariants().is_empty());
    }
}
