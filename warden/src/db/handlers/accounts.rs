//! Database repository for accounts.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountStatusUpdate},
    },
    types::{AccountId, Role},
};

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Account {
    pub id: AccountId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_enabled: bool,
    pub is_banned: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Account> for AccountDBResponse {
    type Error = DbError;

    fn try_from(account: Account) -> Result<Self> {
        let role = account
            .role
            .parse::<Role>()
            .map_err(|e| DbError::Other(anyhow::anyhow!("account {} has invalid role: {e}", account.id)))?;

        Ok(Self {
            id: account.id,
            name: account.name,
            last_name: account.last_name,
            email: account.email,
            password_hash: account.password_hash,
            role,
            is_enabled: account.is_enabled,
            is_banned: account.is_banned,
            reset_token: account.reset_token,
            reset_token_expires_at: account.reset_token_expires_at,
            created_by: account.created_by,
            created_at: account.created_at,
            updated_at: account.updated_at,
        })
    }
}

fn into_response(row: Option<Account>) -> Result<Option<AccountDBResponse>> {
    row.map(AccountDBResponse::try_from).transpose()
}

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up an account by email, regardless of enabled/banned state
    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<AccountDBResponse>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, last_name, email, password_hash, role, is_enabled, is_banned,
                   reset_token, reset_token_expires_at, created_by, created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        into_response(row)
    }

    #[instrument(skip(self, reset_token), err)]
    pub async fn get_by_reset_token(&mut self, reset_token: &str) -> Result<Option<AccountDBResponse>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, last_name, email, password_hash, role, is_enabled, is_banned,
                   reset_token, reset_token_expires_at, created_by, created_at, updated_at
            FROM accounts
            WHERE reset_token = $1
            "#,
        )
        .bind(reset_token)
        .fetch_optional(&mut *self.db)
        .await?;

        into_response(row)
    }

    /// Store a reset token, replacing any previous one
    #[instrument(skip(self, reset_token), err)]
    pub async fn set_reset_token(&mut self, id: AccountId, reset_token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET reset_token = $2, reset_token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reset_token)
        .bind(expires_at)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the password hash and drop any outstanding reset token
    #[instrument(skip(self, password_hash), err)]
    pub async fn update_password(&mut self, id: AccountId, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2, reset_token = NULL, reset_token_expires_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set a new password only if `reset_token` is still the account's current reset token.
    ///
    /// The token is cleared in the same statement, so two concurrent resets with one token cannot
    /// both succeed.
    #[instrument(skip(self, reset_token, password_hash), err)]
    pub async fn complete_password_reset(&mut self, id: AccountId, reset_token: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $3, reset_token = NULL, reset_token_expires_at = NULL, updated_at = NOW()
            WHERE id = $1 AND reset_token = $2
            "#,
        )
        .bind(id)
        .bind(reset_token)
        .bind(password_hash)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_status(&mut self, id: AccountId, update: &AccountStatusUpdate) -> Result<Option<AccountDBResponse>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET is_enabled = COALESCE($2, is_enabled),
                is_banned = COALESCE($3, is_banned),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, last_name, email, password_hash, role, is_enabled, is_banned,
                      reset_token, reset_token_expires_at, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.is_enabled)
        .bind(update.is_banned)
        .fetch_optional(&mut *self.db)
        .await?;

        into_response(row)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type Response = AccountDBResponse;
    type Id = AccountId;

    #[instrument(skip(self, request), fields(role = %request.role), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (name, last_name, email, password_hash, role, is_enabled, is_banned, created_by)
            VALUES ($1, $2, $3, $4, $5, TRUE, FALSE, $6)
            RETURNING id, name, last_name, email, password_hash, role, is_enabled, is_banned,
                      reset_token, reset_token_expires_at, created_by, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.role.as_str())
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        AccountDBResponse::try_from(row)
    }

    /// Look up an account by id, including disabled and banned accounts
    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, last_name, email, password_hash, role, is_enabled, is_banned,
                   reset_token, reset_token_expires_at, created_by, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        into_response(row)
    }

    /// Irreversibly remove an account; its refresh tokens go with it (ON DELETE CASCADE)
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
