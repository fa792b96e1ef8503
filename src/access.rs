//! Caller permissions for administrative operations.

use crate::error::{AllocError, AllocResult};
use crate::types::AccountId;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Admits and removes strategies, sets fees and capacities.
    Governance,
    /// Day-to-day operations: pause, APR overrides, rebalance, hard work.
    Operator,
}

/// Identity and role set of whoever issues an administrative call.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    pub caller: AccountId,
    roles: HashSet<Role>,
}

impl PermissionContext {
    pub fn new(caller: AccountId, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            caller,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn governance(caller: impl Into<String>) -> Self {
        Self::new(AccountId::new(caller), [Role::Governance])
    }

    pub fn operator(caller: impl Into<String>) -> Self {
        Self::new(AccountId::new(caller), [Role::Operator])
    }

    /// Caller with no roles at all.
    pub fn anonymous(caller: impl Into<String>) -> Self {
        Self::new(AccountId::new(caller), [])
    }

    /// Governance implies every operator permission.
    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Governance => self.roles.contains(&Role::Governance),
            Role::Operator => {
                self.roles.contains(&Role::Operator) || self.roles.contains(&Role::Governance)
            }
        }
    }

    pub fn require(&self, role: Role, action: &'static str) -> AllocResult<()> {
        if self.has(role) {
            Ok(())
        } else {
            tracing::warn!(caller = %self.caller, ?role, action, "Permission denied");
            Err(AllocError::PermissionDenied {
                action,
                required: role,
            })
        }
    }
}
