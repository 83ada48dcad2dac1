use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::models::accounts::AccountDBResponse,
    types::{AccountId, Role},
};

/// Public profile returned with every issued session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: AccountId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&AccountDBResponse> for UserInfo {
    fn from(account: &AccountDBResponse) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            last_name: account.last_name.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Administrative view of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub id: AccountId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub enabled: bool,
    pub banned: bool,
    /// Account that provisioned this one; absent for self-registered accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountDBResponse> for AccountDetails {
    fn from(account: AccountDBResponse) -> Self {
        Self {
            id: account.id,
            name: account.name,
            last_name: account.last_name,
            email: account.email,
            role: account.role,
            enabled: account.is_enabled,
            banned: account.is_banned,
            created_by: account.created_by,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvisionAccountRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Email is required"), email(message = "Email must be valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(required(message = "Role is required"))]
    pub role: Option<Role>,
}

/// Partial status change; omitted fields are left as they are
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountStatusRequest {
    pub enabled: Option<bool>,
    pub banned: Option<bool>,
}
