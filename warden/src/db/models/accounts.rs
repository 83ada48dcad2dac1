use chrono::{DateTime, Utc};

use crate::types::{AccountId, Role};

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Account that provisioned this one; `None` for self-registration and the seeded MASTER
    pub created_by: Option<AccountId>,
}

/// Partial update of the enabled/banned flags
#[derive(Debug, Clone, Default)]
pub struct AccountStatusUpdate {
    pub is_enabled: Option<bool>,
    pub is_banned: Option<bool>,
}

/// Database response for an account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_enabled: bool,
    pub is_banned: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
