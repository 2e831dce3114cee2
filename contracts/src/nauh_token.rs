//! # Nauh Token Contract
//!
//! The reference fungible asset the vault custodies and the reward manager
//! pays out. It is a plain balance-and-allowance ledger implementing
//! [`AssetLedger`]; the staking contracts only ever see it through that
//! trait.
//!
//! ## Supply Model
//!
//! - The full supply is minted to the deployer at genesis. There is no
//!   further minting and no burning, so `total_supply` is constant and the
//!   sum of all balances always equals it.
//! - The admin may record which account is the token vault
//!   ([`NauhToken::set_token_vault`]).
//!
//! ## Allowances
//!
//! `transfer_from` consumes allowance. An allowance of `Amount::MAX` is
//! treated as unlimited and never decremented.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use nauh_protocol::asset::{AssetError, AssetLedger};
use nauh_protocol::auth::{CallContext, Role};
use nauh_protocol::config::{TOKEN_DECIMALS, TOKEN_NAME, TOKEN_SYMBOL};
use nauh_protocol::error::StakingResult;
use nauh_protocol::{Address, Amount};

/// Balance ledger for the staking asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NauhToken {
    /// Address of the token contract itself.
    address: Address,
    /// Human-readable name.
    name: String,
    /// Ticker symbol.
    symbol: String,
    /// Display decimals.
    decimals: u8,
    /// Total minted supply. Constant after deploy.
    total_supply: Amount,
    /// Per-account balances. Zero balances are pruned.
    balances: BTreeMap<Address, Amount>,
    /// `owner -> (spender -> allowance)`.
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    /// Account registered as the token vault, if any.
    token_vault: Option<Address>,
}

impl NauhToken {
    /// Deploys the token, minting `initial_supply` to `deployer`.
    pub fn deploy(address: Address, deployer: Address, initial_supply: Amount) -> Self {
        let mut balances = BTreeMap::new();
        if initial_supply > 0 {
            balances.insert(deployer, initial_supply);
        }

        tracing::info!(
            token = %address,
            %deployer,
            supply = %initial_supply,
            "token deployed"
        );

        Self {
            address,
            name: TOKEN_NAME.to_string(),
            symbol: TOKEN_SYMBOL.to_string(),
            decimals: TOKEN_DECIMALS,
            total_supply: initial_supply,
            balances,
            allowances: BTreeMap::new(),
            token_vault: None,
        }
    }

    /// Records `vault` as the token vault. Admin-only.
    pub fn set_token_vault(&mut self, ctx: &CallContext, vault: Address) -> StakingResult<()> {
        ctx.require(Role::Admin)?;
        self.token_vault = Some(vault);
        Ok(())
    }

    /// The registered token vault.
    pub fn token_vault(&self) -> Option<Address> {
        self.token_vault
    }

    /// Address of the token contract.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Display decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Total minted supply.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Sum of all balances. Equal to `total_supply` unless something is
    /// badly wrong; `None` if the sum itself overflows.
    pub fn circulating(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
    }

    /// Applies a validated move of `amount` from `from` to `to`.
    fn move_funds(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::InvalidRecipient);
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(AssetError::InsufficientFunds {
                account: from,
                balance: from_balance,
                requested: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }

        let to_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow { account: to })?;

        let remaining = from_balance - amount;
        if remaining == 0 {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, remaining);
        }
        self.balances.insert(to, to_balance);

        tracing::trace!(%from, %to, %amount, "token transfer");
        Ok(())
    }
}

impl AssetLedger for NauhToken {
    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        self.move_funds(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let allowance = self.allowance(&from, &spender);
        if allowance < amount {
            return Err(AssetError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                requested: amount,
            });
        }

        self.move_funds(from, to, amount)?;

        if allowance != Amount::MAX {
            self.approve(from, spender, allowance - amount);
        }
        Ok(())
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        let per_owner = self.allowances.entry(owner).or_default();
        if amount == 0 {
            per_owner.remove(&spender);
        } else {
            per_owner.insert(spender, amount);
        }
        if per_owner.is_empty() {
            self.allowances.remove(&owner);
        }
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }
}
