//! Common type definitions shared across the auth core, persistence and API layers.
//!
//! - [`AccountId`]: numeric account identifier (BIGSERIAL in PostgreSQL)
//! - [`RefreshTokenId`]: numeric refresh-token record identifier
//! - [`Role`]: the three privilege levels, totally ordered `Master > Admin > User`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type AccountId = i64;
pub type RefreshTokenId = i64;

/// Privilege level of an account.
///
/// The derived `Ord` follows declaration order, so `Role::Master > Role::Admin > Role::User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
    Master,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::Master];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Master => "MASTER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "MASTER" => Ok(Role::Master),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
