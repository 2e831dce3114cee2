//! # Capability-Based Authorization
//!
//! Contracts never look up permissions on their own. Each call arrives with a
//! [`CallContext`] that carries the caller, the ledger time, and the set of
//! [`Capabilities`] the caller holds. Privileged operations check the
//! context with [`CallContext::require`] before touching any state.
//!
//! The [`AccessControl`] registry is the role store that the ledger consults
//! once, at the boundary, to build that context.
//!
//! ```text
//! caller ──► AccessControl::context_for(caller, now) ──► CallContext
//!                                                          │
//!                       RewardManager / TokenVault ◄───────┘  require(Role::Vault)?
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::address::Address;
use crate::error::{StakingError, StakingResult};
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The roles a caller can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// May update the reward rate, wire the vault, and manage roles.
    Admin,
    /// May drive reward-ledger mutations on behalf of users.
    Vault,
}

impl Role {
    fn bit(self) -> u8 {
        match self {
            Role::Admin => 0b01,
            Role::Vault => 0b10,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Vault => write!(f, "VAULT"),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A small set of [`Role`]s, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capabilities at all. What ordinary users carry.
    pub const NONE: Capabilities = Capabilities(0);

    /// Builds a set from a list of roles.
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::NONE, |caps, role| caps.with(*role))
    }

    /// Returns a copy with `role` added.
    pub fn with(self, role: Role) -> Self {
        Capabilities(self.0 | role.bit())
    }

    /// Returns a copy with `role` removed.
    pub fn without(self, role: Role) -> Self {
        Capabilities(self.0 & !role.bit())
    }

    /// Whether `role` is in the set.
    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Everything a contract needs to know about the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The account invoking the operation.
    pub caller: Address,
    /// Ledger time of the call.
    pub now: Timestamp,
    /// Roles held by `caller`, resolved at the ledger boundary.
    pub capabilities: Capabilities,
}

impl CallContext {
    /// Context for an account with no special roles.
    pub fn user(caller: Address, now: Timestamp) -> Self {
        Self {
            caller,
            now,
            capabilities: Capabilities::NONE,
        }
    }

    /// Context with an explicit capability set.
    pub fn with_capabilities(caller: Address, now: Timestamp, capabilities: Capabilities) -> Self {
        Self {
            caller,
            now,
            capabilities,
        }
    }

    /// Fails with [`StakingError::Unauthorized`] unless the context carries
    /// `role`.
    pub fn require(&self, role: Role) -> StakingResult<()> {
        if self.capabilities.contains(role) {
            Ok(())
        } else {
            Err(StakingError::Unauthorized {
                caller: self.caller,
                role,
            })
        }
    }

    /// A context for a contract acting on its own account at the same
    /// instant, e.g. the vault calling into the reward manager.
    pub fn delegate(&self, contract: Address, capabilities: Capabilities) -> Self {
        Self {
            caller: contract,
            now: self.now,
            capabilities,
        }
    }
}

// ---------------------------------------------------------------------------
// AccessControl
// ---------------------------------------------------------------------------

/// Role registry: which accounts hold which roles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    grants: BTreeMap<Address, BTreeSet<Role>>,
}

impl AccessControl {
    /// A registry whose only entry is `admin` holding [`Role::Admin`].
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        access.insert(Role::Admin, admin);
        access
    }

    /// The `hasRole(role, account)` check.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.grants
            .get(account)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// All roles held by `account`.
    pub fn capabilities_of(&self, account: &Address) -> Capabilities {
        self.grants
            .get(account)
            .map(|roles| roles.iter().fold(Capabilities::NONE, |c, r| c.with(*r)))
            .unwrap_or_default()
    }

    /// Builds the call context for `caller` at `now`.
    pub fn context_for(&self, caller: Address, now: Timestamp) -> CallContext {
        CallContext::with_capabilities(caller, now, self.capabilities_of(&caller))
    }

    /// Grants `role` to `account`. Admin-only. Returns `false` if the
    /// account already held the role.
    pub fn grant_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
    ) -> StakingResult<bool> {
        ctx.require(Role::Admin)?;
        let added = self.insert(role, account);
        if added {
            tracing::info!(%role, %account, granted_by = %ctx.caller, "role granted");
        }
        Ok(added)
    }

    /// Revokes `role` from `account`. Admin-only. Returns `false` if the
    /// account did not hold the role.
    pub fn revoke_role(
        &mut self,
        ctx: &CallContext,
        role: Role,
        account: Address,
    ) -> StakingResult<bool> {
        ctx.require(Role::Admin)?;
        let removed = match self.grants.get_mut(&account) {
            Some(roles) => {
                let removed = roles.remove(&role);
                if roles.is_empty() {
                    self.grants.remove(&account);
                }
                removed
            }
            None => false,
        };
        if removed {
            tracing::info!(%role, %account, revoked_by = %ctx.caller, "role revoked");
        }
        Ok(removed)
    }

    /// Accounts currently holding `role`.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.grants
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(addr, _)| *addr)
            .collect()
    }

    fn insert(&mut self, role: Role, account: Address) -> bool {
        self.grants.entry(account).or_default().insert(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::derive("admin")
    }

    #[test]
    fn capabilities_set_operations() {
        let caps = Capabilities::of(&[Role::Admin]);
        assert!(caps.contains(Role::Admin));
        assert!(!caps.contains(Role::Vault));

        let caps = caps.with(Role::Vault).without(Role::Admin);
        assert!(caps.contains(Role::Vault));
        assert!(!caps.contains(Role::Admin));
        assert!(Capabilities::NONE.is_empty());
    }

    #[test]
    fn require_rejects_missing_role() {
        let ctx = CallContext::user(Address::derive("mallory"), 0);
        let err = ctx.require(Role::Admin).unwrap_err();
        assert!(matches!(
            err,
            StakingError::Unauthorized {
                role: Role::Admin,
                ..
            }
        ));
    }

    #[test]
    fn context_for_resolves_registry_roles() {
        let access = AccessControl::with_admin(admin());
        let ctx = access.context_for(admin(), 5);
        assert!(ctx.require(Role::Admin).is_ok());
        assert_eq!(ctx.now, 5);

        let stranger = access.context_for(Address::derive("stranger"), 5);
        assert!(stranger.capabilities.is_empty());
    }

    #[test]
    fn only_admin_grants_roles() {
        let mut access = AccessControl::with_admin(admin());
        let vault = Address::derive("token-vault");

        let user_ctx = access.context_for(Address::derive("user"), 0);
        assert!(access.grant_role(&user_ctx, Role::Vault, vault).is_err());
        assert!(!access.has_role(Role::Vault, &vault));

        let admin_ctx = access.context_for(admin(), 0);
        assert!(access.grant_role(&admin_ctx, Role::Vault, vault).unwrap());
        assert!(!access.grant_role(&admin_ctx, Role::Vault, vault).unwrap());
        assert!(access.has_role(Role::Vault, &vault));
        assert_eq!(access.members(Role::Vault), vec![vault]);
    }

    #[test]
    fn revoke_removes_role() {
        let mut access = AccessControl::with_admin(admin());
        let vault = Address::derive("token-vault");
        let ctx = access.context_for(admin(), 0);

        access.grant_role(&ctx, Role::Vault, vault).unwrap();
        assert!(access.revoke_role(&ctx, Role::Vault, vault).unwrap());
        assert!(!access.revoke_role(&ctx, Role::Vault, vault).unwrap());
        assert!(access.capabilities_of(&vault).is_empty());
    }

    #[test]
    fn delegate_keeps_time() {
        let ctx = CallContext::user(Address::derive("alice"), 99);
        let vault = Address::derive("token-vault");
        let delegated = ctx.delegate(vault, Capabilities::of(&[Role::Vault]));
        assert_eq!(delegated.caller, vault);
        assert_eq!(delegated.now, 99);
        assert!(delegated.require(Role::Vault).is_ok());
    }
}
