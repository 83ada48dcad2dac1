//! PostgreSQL-backed [`Store`](crate::db::store::Store).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    db::{
        errors::Result,
        handlers::{Accounts, RefreshTokens, Repository},
        models::{
            accounts::{AccountCreateDBRequest, AccountDBResponse, AccountStatusUpdate},
            refresh_tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
        },
        store::{AccountStore, RefreshTokenStore},
    },
    types::{AccountId, RefreshTokenId},
};

/// Each call acquires its own pooled connection; every operation is a single statement.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).get_by_email(email).await
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).get_by_id(id).await
    }

    async fn find_account_by_reset_token(&self, reset_token: &str) -> Result<Option<AccountDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).get_by_reset_token(reset_token).await
    }

    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).create(request).await
    }

    async fn set_reset_token(&self, id: AccountId, reset_token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).set_reset_token(id, reset_token, expires_at).await
    }

    async fn update_password(&self, id: AccountId, password_hash: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).update_password(id, password_hash).await
    }

    async fn complete_password_reset(&self, id: AccountId, reset_token: &str, password_hash: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).complete_password_reset(id, reset_token, password_hash).await
    }

    async fn set_account_status(&self, id: AccountId, update: &AccountStatusUpdate) -> Result<Option<AccountDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).update_status(id, update).await
    }

    async fn purge_account(&self, id: AccountId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Accounts::new(&mut conn).delete(id).await
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        RefreshTokens::new(&mut conn).get_by_token(token).await
    }

    async fn save_refresh_token(&self, request: &RefreshTokenCreateDBRequest) -> Result<RefreshTokenDBResponse> {
        let mut conn = self.pool.acquire().await?;
        RefreshTokens::new(&mut conn).create(request).await
    }

    async fn delete_refresh_token(&self, id: RefreshTokenId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        RefreshTokens::new(&mut conn).delete(id).await
    }
}
