use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    auth::hierarchy::Requester,
    db::models::accounts::AccountDBResponse,
    errors::{Error, Result},
    types::{AccountId, Role},
};

/// Caller identity established by the request gate.
///
/// The role and status come from the live account row, not from the token claims, so a demotion
/// or ban applies to the very next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentAccount {
    pub id: AccountId,
    pub email: String,
    pub role: Role,
    pub is_enabled: bool,
}

impl CurrentAccount {
    pub fn as_requester(&self) -> Requester {
        Requester {
            id: self.id,
            role: self.role,
            is_enabled: self.is_enabled,
        }
    }
}

impl From<&AccountDBResponse> for CurrentAccount {
    fn from(account: &AccountDBResponse) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
            is_enabled: account.is_enabled,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentAccount {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentAccount>()
            .cloned()
            .ok_or(Error::Unauthenticated { message: None })
    }
}
