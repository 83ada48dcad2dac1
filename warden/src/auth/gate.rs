//! Account state checks shared by login, refresh and the per-request gate.

use crate::{auth::password::PasswordService, db::models::accounts::AccountDBResponse, errors::Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allowed,
    Disabled,
    Banned,
}

/// Whether `account` may authenticate. Disabled is checked before banned at every entry point.
pub fn can_authenticate(account: &AccountDBResponse) -> GateOutcome {
    if !account.is_enabled {
        GateOutcome::Disabled
    } else if account.is_banned {
        GateOutcome::Banned
    } else {
        GateOutcome::Allowed
    }
}

pub async fn password_matches(passwords: &PasswordService, plain: &str, stored_hash: &str) -> Result<bool> {
    passwords.verify(plain, stored_hash).await
}
