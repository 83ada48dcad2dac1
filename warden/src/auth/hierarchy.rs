//! Role hierarchy: who may create, view and modify whom.
//!
//! The policy is a fixed table, one row per role. Changing what a role may do means editing
//! [`POLICY`], never adding branches to the checks below.

use crate::types::{AccountId, Role};

/// Which accounts other than their own a role may view or modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    /// Every account
    All,
    /// Only accounts whose `created_by` is the requester
    CreatedBySelf,
    /// No account but their own
    SelfOnly,
}

#[derive(Debug)]
struct RolePolicy {
    role: Role,
    may_create: &'static [Role],
    may_access: AccessScope,
}

const POLICY: [RolePolicy; 3] = [
    RolePolicy {
        role: Role::Master,
        may_create: &[Role::Master, Role::Admin, Role::User],
        may_access: AccessScope::All,
    },
    RolePolicy {
        role: Role::Admin,
        may_create: &[Role::User],
        may_access: AccessScope::CreatedBySelf,
    },
    RolePolicy {
        role: Role::User,
        may_create: &[],
        may_access: AccessScope::SelfOnly,
    },
];

fn policy_for(role: Role) -> &'static RolePolicy {
    // POLICY has a row for every Role variant; the test below keeps it that way
    POLICY.iter().find(|p| p.role == role).unwrap_or(&POLICY[POLICY.len() - 1])
}

/// Roles an actor with `role` may provision
pub fn creatable_roles(role: Role) -> &'static [Role] {
    policy_for(role).may_create
}

pub fn can_create(creator_role: Role, target_role: Role) -> bool {
    creatable_roles(creator_role).contains(&target_role)
}

/// The requesting side of an access decision.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub id: AccountId,
    pub role: Role,
    pub is_enabled: bool,
}

/// Whether `requester` may view or modify the account `target_id`, created by `target_created_by`.
pub fn can_access(requester: Requester, target_id: AccountId, target_created_by: Option<AccountId>) -> bool {
    if requester.id == target_id {
        return true;
    }
    if !requester.is_enabled {
        return false;
    }

    match policy_for(requester.role).may_access {
        AccessScope::All => true,
        AccessScope::CreatedBySelf => target_created_by == Some(requester.id),
        AccessScope::SelfOnly => false,
    }
}
