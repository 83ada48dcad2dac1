//! In-process [`Store`](crate::db::store::Store) for `database.type = memory`.
//!
//! Enforces the same uniqueness rules as the schema (account email, reset token, refresh token
//! string) and reports violations with the same constraint names, so callers cannot tell the
//! backends apart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    db::{
        errors::{ACCOUNTS_EMAIL_UNIQUE, DbError, Result},
        models::{
            accounts::{AccountCreateDBRequest, AccountDBResponse, AccountStatusUpdate},
            refresh_tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
        },
        store::{AccountStore, RefreshTokenStore},
    },
    types::{AccountId, RefreshTokenId},
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, AccountDBResponse>,
    refresh_tokens: HashMap<RefreshTokenId, RefreshTokenDBResponse>,
    next_account_id: AccountId,
    next_refresh_token_id: RefreshTokenId,
}

impl State {
    fn unique_violation(constraint: &str, table: &str) -> DbError {
        DbError::UniqueViolation {
            constraint: Some(constraint.to_string()),
            table: Some(table.to_string()),
            message: format!("duplicate key value violates unique constraint \"{constraint}\""),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<AccountDBResponse>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<AccountDBResponse>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_reset_token(&self, reset_token: &str) -> Result<Option<AccountDBResponse>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.reset_token.as_deref() == Some(reset_token))
            .cloned())
    }

    async fn create_account(&self, request: &AccountCreateDBRequest) -> Result<AccountDBResponse> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.email == request.email) {
            return Err(State::unique_violation(ACCOUNTS_EMAIL_UNIQUE, "accounts"));
        }
        if let Some(creator) = request.created_by
            && !state.accounts.contains_key(&creator)
        {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("accounts_created_by_fkey".to_string()),
                table: Some("accounts".to_string()),
                message: format!("creator {creator} does not exist"),
            });
        }

        state.next_account_id += 1;
        let now = Utc::now();
        let account = AccountDBResponse {
            id: state.next_account_id,
            name: request.name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            role: request.role,
            is_enabled: true,
            is_banned: false,
            reset_token: None,
            reset_token_expires_at: None,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn set_reset_token(&self, id: AccountId, reset_token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        if state
            .accounts
            .values()
            .any(|a| a.id != id && a.reset_token.as_deref() == Some(reset_token))
        {
            return Err(State::unique_violation("accounts_reset_token_unique", "accounts"));
        }

        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(false);
        };
        account.reset_token = Some(reset_token.to_string());
        account.reset_token_expires_at = Some(expires_at);
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_password(&self, id: AccountId, password_hash: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(false);
        };
        account.password_hash = password_hash.to_string();
        account.reset_token = None;
        account.reset_token_expires_at = None;
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn complete_password_reset(&self, id: AccountId, reset_token: &str, password_hash: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.accounts.get_mut(&id) {
            Some(account) if account.reset_token.as_deref() == Some(reset_token) => {
                account.password_hash = password_hash.to_string();
                account.reset_token = None;
                account.reset_token_expires_at = None;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_account_status(&self, id: AccountId, update: &AccountStatusUpdate) -> Result<Option<AccountDBResponse>> {
        let mut state = self.state.write().await;
        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(enabled) = update.is_enabled {
            account.is_enabled = enabled;
        }
        if let Some(banned) = update.is_banned {
            account.is_banned = banned;
        }
        account.updated_at = Utc::now();
        Ok(Some(account.clone()))
    }

    async fn purge_account(&self, id: AccountId) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.accounts.remove(&id).is_none() {
            return Ok(false);
        }
        state.refresh_tokens.retain(|_, t| t.account_id != id);
        // created_by is ON DELETE SET NULL
        for account in state.accounts.values_mut() {
            if account.created_by == Some(id) {
                account.created_by = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshTokenDBResponse>> {
        let state = self.state.read().await;
        Ok(state.refresh_tokens.values().find(|t| t.token == token).cloned())
    }

    async fn save_refresh_token(&self, request: &RefreshTokenCreateDBRequest) -> Result<RefreshTokenDBResponse> {
        let mut state = self.state.write().await;
        if state.refresh_tokens.values().any(|t| t.token == request.token) {
            return Err(State::unique_violation("refresh_tokens_token_unique", "refresh_tokens"));
        }
        if !state.accounts.contains_key(&request.account_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("refresh_tokens_account_id_fkey".to_string()),
                table: Some("refresh_tokens".to_string()),
                message: format!("account {} does not exist", request.account_id),
            });
        }

        let now = Utc::now();
        state
            .refresh_tokens
            .retain(|_, t| t.account_id != request.account_id || !t.is_expired_at(now));

        state.next_refresh_token_id += 1;
        let record = RefreshTokenDBResponse {
            id: state.next_refresh_token_id,
            token: request.token.clone(),
            account_id: request.account_id,
            expires_at: request.expires_at,
            created_at: now,
        };
        state.refresh_tokens.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_refresh_token(&self, id: RefreshTokenId) -> Result<bool> {
        Ok(self.state.write().await.refresh_tokens.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::Duration;

    fn request(email: &str) -> AccountCreateDBRequest {
        AccountCreateDBRequest {
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reports_schema_constraint() {
        let store = MemoryStore::new();
        store.create_account(&request("a@x.com")).await.unwrap();

        let err = store.create_account(&request("a@x.com")).await.unwrap_err();
        assert!(err.is_duplicate_email());

        // Same address with different case is a different account, as in the schema
        store.create_account(&request("A@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_creator_is_foreign_key_violation() {
        let store = MemoryStore::new();
        let mut req = request("a@x.com");
        req.created_by = Some(99);
        assert!(matches!(
            store.create_account(&req).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_delete_reports_once() {
        let store = MemoryStore::new();
        let account = store.create_account(&request("a@x.com")).await.unwrap();
        let saved = store
            .save_refresh_token(&RefreshTokenCreateDBRequest {
                token: "t".to_string(),
                account_id: account.id,
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        assert!(store.delete_refresh_token(saved.id).await.unwrap());
        assert!(!store.delete_refresh_token(saved.id).await.unwrap());
        assert!(store.find_refresh_token("t").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saving_token_sweeps_expired_ones_of_that_account() {
        let store = MemoryStore::new();
        let ada = store.create_account(&request("a@x.com")).await.unwrap();
        let bob = store.create_account(&request("b@x.com")).await.unwrap();
        let save = |token: &str, account_id, expires_at| RefreshTokenCreateDBRequest {
            token: token.to_string(),
            account_id,
            expires_at,
        };

        let past = Utc::now() - Duration::minutes(1);
        let future = Utc::now() + Duration::days(7);
        store.save_refresh_token(&save("ada-old", ada.id, past)).await.unwrap();
        store.save_refresh_token(&save("ada-live", ada.id, future)).await.unwrap();
        store.save_refresh_token(&save("bob-old", bob.id, past)).await.unwrap();

        store.save_refresh_token(&save("ada-new", ada.id, future)).await.unwrap();

        assert!(store.find_refresh_token("ada-old").await.unwrap().is_none());
        assert!(store.find_refresh_token("ada-live").await.unwrap().is_some());
        assert!(store.find_refresh_token("ada-new").await.unwrap().is_some());
        // Another account's expired token is left for its own next save
        assert!(store.find_refresh_token("bob-old").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_cascades_and_nulls_creator() {
        let store = MemoryStore::new();
        let admin = store.create_account(&request("admin@x.com")).await.unwrap();
        let mut child_req = request("child@x.com");
        child_req.created_by = Some(admin.id);
        let child = store.create_account(&child_req).await.unwrap();
        store
            .save_refresh_token(&RefreshTokenCreateDBRequest {
                token: "admin-token".to_string(),
                account_id: admin.id,
                expires_at: Utc::now() + Duration::days(7),
            })
            .await
            .unwrap();

        assert!(store.purge_account(admin.id).await.unwrap());
        assert!(store.find_account_by_id(admin.id).await.unwrap().is_none());
        assert!(store.find_refresh_token("admin-token").await.unwrap().is_none());
        let child = store.find_account_by_id(child.id).await.unwrap().unwrap();
        assert_eq!(child.created_by, None);
    }

    #[tokio::test]
    async fn test_complete_password_reset_requires_current_token() {
        let store = MemoryStore::new();
        let account = store.create_account(&request("a@x.com")).await.unwrap();
        store
            .set_reset_token(account.id, "reset-1", Utc::now() + Duration::minutes(15))
            .await
            .unwrap();

        assert!(!store.complete_password_reset(account.id, "stale", "new-hash").await.unwrap());
        assert!(store.complete_password_reset(account.id, "reset-1", "new-hash").await.unwrap());
        assert!(!store.complete_password_reset(account.id, "reset-1", "newer-hash").await.unwrap());

        let account = store.find_account_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.password_hash, "new-hash");
        assert!(account.reset_token.is_none());
    }

    #[tokio::test]
    async fn test_status_update_is_partial() {
        let store = MemoryStore::new();
        let account = store.create_account(&request("a@x.com")).await.unwrap();

        let updated = store
            .set_account_status(
                account.id,
                &AccountStatusUpdate {
                    is_enabled: Some(false),
                    is_banned: None,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_enabled);
        assert!(!updated.is_banned);

        // Disabled accounts remain addressable by id and email
        assert!(store.find_account_by_id(account.id).await.unwrap().is_some());
        assert!(store.find_account_by_email("a@x.com").await.unwrap().is_some());
    }
}
