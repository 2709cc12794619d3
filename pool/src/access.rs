//! Role-based access control.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tide_types::{AccountId, Role};

use crate::error::PoolError;

/// Answers whether an account may perform operations gated by a role.
pub trait AccessControl {
    fn has_role(&self, account: &AccountId, role: Role) -> bool;

    fn require_role(&self, account: &AccountId, role: Role) -> Result<(), PoolError> {
        if self.has_role(account, role) {
            Ok(())
        } else {
            Err(PoolError::Unauthorized {
                account: account.clone(),
                role,
            })
        }
    }
}

/// In-memory role assignments.
///
/// The account passed to [`RoleRegistry::new`] starts with every role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    members: BTreeMap<Role, BTreeSet<AccountId>>,
}

impl RoleRegistry {
    pub fn new(admin: AccountId) -> Self {
        let mut registry = Self::default();
        for role in Role::ALL {
            registry.insert(role, admin.clone());
        }
        registry
    }

    /// Grant `role` to `account`. Only an `Admin` may grant.
    pub fn grant_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<bool, PoolError> {
        self.require_role(caller, Role::Admin)?;
        Ok(self.insert(role, account))
    }

    /// Revoke `role` from `account`. Only an `Admin` may revoke, and the last
    /// admin cannot revoke itself.
    pub fn revoke_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> Result<bool, PoolError> {
        self.require_role(caller, Role::Admin)?;
        if role == Role::Admin
            && self.members_of(Role::Admin).count() == 1
            && self.has_role(account, Role::Admin)
        {
            return Err(PoolError::InvalidParameter(
                "cannot revoke the last admin".to_string(),
            ));
        }
        let removed = self
            .members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false);
        Ok(removed)
    }

    pub fn members_of(&self, role: Role) -> impl Iterator<Item = &AccountId> {
        self.members.get(&role).into_iter().flatten()
    }

    fn insert(&mut self, role: Role, account: AccountId) -> bool {
        self.members.entry(role).or_default().insert(account)
    }
}

impl AccessControl for RoleRegistry {
    fn has_role(&self, account: &AccountId, role: Role) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(account))
    }
}
