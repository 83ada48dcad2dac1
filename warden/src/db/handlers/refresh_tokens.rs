//! Database repository for refresh tokens.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::refresh_tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
    },
    types::RefreshTokenId,
};

pub struct RefreshTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RefreshTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, token), err)]
    pub async fn get_by_token(&mut self, token: &str) -> Result<Option<RefreshTokenDBResponse>> {
        let record = sqlx::query_as::<_, RefreshTokenDBResponse>(
            r#"
            SELECT id, token, account_id, expires_at, created_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for RefreshTokens<'c> {
    type CreateRequest = RefreshTokenCreateDBRequest;
    type Response = RefreshTokenDBResponse;
    type Id = RefreshTokenId;

    /// Persist a token, deleting the account's expired ones in the same statement
    #[instrument(skip(self, request), fields(account_id = request.account_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let record = sqlx::query_as::<_, RefreshTokenDBResponse>(
            r#"
            WITH swept AS (
                DELETE FROM refresh_tokens
                WHERE account_id = $2 AND expires_at <= NOW()
            )
            INSERT INTO refresh_tokens (token, account_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, token, account_id, expires_at, created_at
            "#,
        )
        .bind(&request.token)
        .bind(request.account_id)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let record = sqlx::query_as::<_, RefreshTokenDBResponse>(
            r#"
            SELECT id, token, account_id, expires_at, created_at
            FROM refresh_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    /// Consume a token. Only one of several concurrent deletes of the same row reports `true`.
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
