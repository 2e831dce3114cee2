//! # Asset Ledger Interface
//!
//! The staking engine does not own the fungible asset it accounts for. It
//! talks to whatever holds balances through the narrow [`AssetLedger`]
//! trait: move funds, move funds on an allowance, read a balance.
//!
//! Implementations must be all-or-nothing per call: a transfer that returns
//! an error must leave every balance and allowance untouched.

use thiserror::Error;

use crate::address::Address;
use crate::Amount;

/// Failures reported by an asset ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The source account does not hold enough of the asset.
    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        balance: Amount,
        /// The amount requested.
        requested: Amount,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}'s funds, requested {requested}")]
    InsufficientAllowance {
        /// The account whose funds are being moved.
        owner: Address,
        /// The account moving them.
        spender: Address,
        /// Remaining allowance.
        allowance: Amount,
        /// The amount requested.
        requested: Amount,
    },

    /// Crediting the destination would overflow its balance.
    #[error("balance overflow crediting {account}")]
    Overflow {
        /// The account being credited.
        account: Address,
    },

    /// Transfers to the zero address are refused.
    #[error("invalid recipient: the zero address cannot receive funds")]
    InvalidRecipient,
}

/// The operations the staking engine consumes from the asset ledger.
pub trait AssetLedger {
    /// Moves `amount` from `from` to `to`. The caller is `from`.
    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), AssetError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// the allowance `from` granted to `spender`.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError>;

    /// Sets the allowance `owner` grants to `spender`.
    fn approve(&mut self, owner: Address, spender: Address, amount: Amount);

    /// Remaining allowance of `spender` over `owner`'s funds.
    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Balance of `account`.
    fn balance_of(&self, account: &Address) -> Amount;
}
