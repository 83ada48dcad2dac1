//! Login, registration, refresh and password reset flows.
//!
//! Every flow is a stateless operation over the [`Store`]: the manager keeps no per-session state
//! in memory, so any number of requests may run through it concurrently.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::{
    auth::{
        current_user::CurrentAccount,
        gate::{GateOutcome, can_authenticate, password_matches},
        hierarchy::can_create,
        password::{Argon2Params, PasswordService, hash_with_params},
        session::{TokenCodec, issue_opaque_token},
    },
    config::Config,
    db::{
        models::{
            accounts::{AccountCreateDBRequest, AccountDBResponse},
            refresh_tokens::RefreshTokenCreateDBRequest,
        },
        store::Store,
    },
    email::password_reset_email,
    errors::{Error, FieldError, Result},
    notifications::NotificationDispatcher,
    types::{AccountId, Role},
};

/// Credentials issued by a successful login, registration or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub account: AccountDBResponse,
}

/// Profile and credential of an account about to be created.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct Lifetimes {
    access_token: Duration,
    refresh_token: Duration,
    reset_token: Duration,
}

pub struct SessionManager {
    store: Arc<dyn Store>,
    codec: TokenCodec,
    passwords: PasswordService,
    /// Verified against when the login email is unknown, so both paths cost one argon2 run
    dummy_hash: String,
    notifier: NotificationDispatcher,
    lifetimes: Lifetimes,
    password_min: usize,
    password_max: usize,
    frontend_base: String,
}

fn expiry_after(ttl: Duration) -> Result<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Internal {
        operation: format!("compute token expiry: {e}"),
    })?;
    Ok(Utc::now() + ttl)
}

fn ensure_can_authenticate(account: &AccountDBResponse) -> Result<()> {
    match can_authenticate(account) {
        GateOutcome::Allowed => Ok(()),
        GateOutcome::Disabled => Err(Error::AccountDisabled),
        GateOutcome::Banned => Err(Error::AccountBanned),
    }
}

impl SessionManager {
    pub fn new(config: &Config, store: Arc<dyn Store>, notifier: NotificationDispatcher) -> Result<Self> {
        let password = &config.auth.password;
        let params = Argon2Params::from(password);
        Ok(Self {
            store,
            codec: TokenCodec::from_config(config)?,
            passwords: PasswordService::new(params),
            dummy_hash: hash_with_params(&issue_opaque_token(), params)?,
            notifier,
            lifetimes: Lifetimes {
                access_token: config.auth.jwt.access_token_ttl,
                refresh_token: config.auth.jwt.refresh_token_ttl,
                reset_token: config.auth.password_reset_token_ttl,
            },
            password_min: password.min_length,
            password_max: password.max_length,
            frontend_base: config.frontend_base().to_string(),
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    /// Check a plaintext password against the configured length policy
    pub fn check_password_policy(&self, field: &str, password: &str) -> Result<()> {
        let length = password.chars().count();
        let message = if length < self.password_min {
            format!("Password must be at least {} characters", self.password_min)
        } else if length > self.password_max {
            format!("Password must be at most {} characters", self.password_max)
        } else {
            return Ok(());
        };

        Err(Error::Validation {
            field_errors: vec![FieldError {
                field: field.to_string(),
                rejected_value: None,
                message,
            }],
        })
    }

    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let Some(account) = self.store.find_account_by_email(email).await? else {
            password_matches(&self.passwords, password, &self.dummy_hash).await?;
            return Err(Error::InvalidCredentials);
        };

        ensure_can_authenticate(&account)?;

        if !password_matches(&self.passwords, password, &account.password_hash).await? {
            return Err(Error::InvalidCredentials);
        }

        tracing::info!(account_id = account.id, "Login succeeded");
        self.open_session(account).await
    }

    #[instrument(skip_all)]
    pub async fn register(&self, new_account: NewAccount<'_>) -> Result<AuthSession> {
        let account = self.create_account(new_account, Role::User, None).await?;
        tracing::info!(account_id = account.id, "Registered account");
        self.open_session(account).await
    }

    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// The presented token is consumed before anything else is decided, so it can never be used
    /// twice: not after success, not after expiry, not after the account was disabled.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let record = self
            .store
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(Error::InvalidRefreshToken)?;

        if !self.store.delete_refresh_token(record.id).await? {
            // A concurrent refresh consumed it first
            return Err(Error::InvalidRefreshToken);
        }
        if record.is_expired_at(Utc::now()) {
            tracing::debug!(account_id = record.account_id, "Expired refresh token presented");
            return Err(Error::RefreshTokenExpired);
        }

        let account = self
            .store
            .find_account_by_id(record.account_id)
            .await?
            .ok_or(Error::InvalidRefreshToken)?;
        ensure_can_authenticate(&account)?;

        self.open_session(account).await
    }

    /// Issue a reset token for `email` and queue the reset email.
    ///
    /// Unknown addresses are reported as such. The email goes out in the background; its delivery
    /// does not affect the result.
    #[instrument(skip_all)]
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let not_found = || Error::EmailNotFound { email: email.to_string() };
        let account = self.store.find_account_by_email(email).await?.ok_or_else(not_found)?;

        let reset_token = issue_opaque_token();
        let expires_at = expiry_after(self.lifetimes.reset_token)?;
        let reset_link = format!("{}/reset-password?token={}", self.frontend_base, reset_token);
        let email = password_reset_email(&account.email, &account.name, &reset_link, self.lifetimes.reset_token)?;

        // Overwrites any earlier token; only the latest one works
        if !self.store.set_reset_token(account.id, &reset_token, expires_at).await? {
            return Err(not_found());
        }
        self.notifier.dispatch(email);

        tracing::info!(account_id = account.id, "Password reset requested");
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<()> {
        let account = self
            .store
            .find_account_by_reset_token(reset_token)
            .await?
            .ok_or(Error::InvalidResetToken)?;

        match account.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(Error::ResetTokenExpired),
        }

        self.check_password_policy("newPassword", new_password)?;
        let password_hash = self.passwords.hash(new_password).await?;

        // Conditional on the token, so a token used concurrently only succeeds once
        if !self
            .store
            .complete_password_reset(account.id, reset_token, &password_hash)
            .await?
        {
            return Err(Error::InvalidResetToken);
        }

        tracing::info!(account_id = account.id, "Password reset completed");
        Ok(())
    }

    /// Create an account of `role` on behalf of `creator`, within the role hierarchy
    #[instrument(skip_all, fields(creator_id = creator.id, role = %role))]
    pub async fn provision_account(
        &self,
        creator: &CurrentAccount,
        new_account: NewAccount<'_>,
        role: Role,
    ) -> Result<AccountDBResponse> {
        if !can_create(creator.role, role) {
            return Err(Error::Forbidden {
                message: format!("A {} account cannot create {} accounts", creator.role, role),
            });
        }

        let account = self.create_account(new_account, role, Some(creator.id)).await?;
        tracing::info!(account_id = account.id, "Provisioned account");
        Ok(account)
    }

    async fn create_account(
        &self,
        new_account: NewAccount<'_>,
        role: Role,
        created_by: Option<AccountId>,
    ) -> Result<AccountDBResponse> {
        self.check_password_policy("password", new_account.password)?;

        let duplicate = || Error::DuplicateEmail {
            email: new_account.email.to_string(),
        };
        if self.store.find_account_by_email(new_account.email).await?.is_some() {
            return Err(duplicate());
        }

        let password_hash = self.passwords.hash(new_account.password).await?;
        let request = AccountCreateDBRequest {
            name: new_account.name.to_string(),
            last_name: new_account.last_name.to_string(),
            email: new_account.email.to_string(),
            password_hash,
            role,
            created_by,
        };

        // The unique constraint catches registrations racing past the check above
        self.store.create_account(&request).await.map_err(|e| {
            if e.is_duplicate_email() {
                duplicate()
            } else {
                Error::Database(e)
            }
        })
    }

    async fn open_session(&self, account: AccountDBResponse) -> Result<AuthSession> {
        let access_token = self
            .codec
            .issue_access_token(account.id, &account.email, account.role, self.lifetimes.access_token)?;

        let refresh_token = issue_opaque_token();
        self.store
            .save_refresh_token(&RefreshTokenCreateDBRequest {
                token: refresh_token.clone(),
                account_id: account.id,
                expires_at: expiry_after(self.lifetimes.refresh_token)?,
            })
            .await?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_in: self.lifetimes.access_token.as_secs(),
            account,
        })
    }
}
