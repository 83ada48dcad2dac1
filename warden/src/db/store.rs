//! Persistence seam used by the auth core.
//!
//! The session manager and request gate only see these traits. [`PgStore`](crate::db::postgres::PgStore)
//! backs them with PostgreSQL; [`MemoryStore`](crate::db::memory::MemoryStore) keeps state in
//! process for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::{
        errors::Result,
        models::{
            accounts::{AccountCreateDBRequest, AccountDBResponse, AccountStatusUpdate},
            refresh_tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
        },
    },
    types::{AccountId, RefreshTokenId},
};

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Lookup by email, including disabled and banned accounts
    async fn find_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>>;

    /// Lookup by id, including disabled and banned accounts
    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<AccountDBResponse>>;

    async fn find_account_by_reset_token(&self, reset_token: &str) -> Result<Option<AccountDBResponse>>;

    /// Insert an enabled, unbanned account. A taken email fails with the
    /// [`ACCOUNTS_EMAIL_UNIQUE`](crate::db::errors::ACCOUNTS_EMAIL_UNIQUE) unique violation.
    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse>;

    /// Overwrite the account's reset token and its expiry
    async fn set_reset_token(&self, id: AccountId, reset_token: &str, expires_at: DateTime<Utc>) -> Result<bool>;

    /// Replace the password hash and clear any reset token
    async fn update_password(&self, id: AccountId, password_hash: &str) -> Result<bool>;

    /// Replace the password hash only while `reset_token` is still current, clearing it
    async fn complete_password_reset(&self, id: AccountId, reset_token: &str, password_hash: &str) -> Result<bool>;

    async fn set_account_status(&self, id: AccountId, update: &AccountStatusUpdate) -> Result<Option<AccountDBResponse>>;

    /// Irreversible removal, cascading to the account's refresh tokens
    async fn purge_account(&self, id: AccountId) -> Result<bool>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenDBResponse>>;

    async fn save_refresh_token(&self, request: &RefreshTokenCreateDBRequest) -> Result<RefreshTokenDBResponse>;

    /// Returns `false` when the token was already gone, e.g. consumed by a concurrent refresh
    async fn delete_refresh_token(&self, id: RefreshTokenId) -> Result<bool>;
}

/// Everything the auth core needs from persistence.
pub trait Store: AccountStore + RefreshTokenStore {}

impl<T: AccountStore + RefreshTokenStore> Store for T {}
