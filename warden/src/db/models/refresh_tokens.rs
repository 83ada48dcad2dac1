use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{AccountId, RefreshTokenId};

/// Database request for persisting a freshly minted refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenCreateDBRequest {
    pub token: String,
    pub account_id: AccountId,
    pub expires_at: DateTime<Utc>,
}

/// Database response for a refresh token
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RefreshTokenDBResponse {
    pub id: RefreshTokenId,
    pub token: String,
    pub account_id: AccountId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenDBResponse {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
