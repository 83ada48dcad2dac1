//! Shared fixtures for unit and HTTP tests.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;
use tokio::sync::{Mutex, mpsc};

use crate::{
    Application,
    api::models::auth::AuthResponse,
    config::{Config, DatabaseConfig, NotificationsConfig, PasswordConfig, Secret},
    db::{
        models::accounts::AccountStatusUpdate,
        store::Store,
    },
    errors::Error,
    notifications::{EmailRequest, NotificationSender},
    types::AccountId,
};

pub const TEST_MASTER_EMAIL: &str = "master@test.com";
pub const TEST_MASTER_PASSWORD: &str = "master-password";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        admin_email: Some(TEST_MASTER_EMAIL.to_string()),
        admin_password: Some(Secret::new(TEST_MASTER_PASSWORD)),
        secret_key: Some(Secret::new("test-secret-key-for-testing-only")),
        auth: crate::config::AuthConfig {
            // Cheap hashing keeps the HTTP tests fast
            password: PasswordConfig {
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                argon2_parallelism: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        notifications: NotificationsConfig {
            queue_capacity: 16,
            max_attempts: 2,
            retry_backoff: Duration::from_millis(10),
        },
        ..Default::default()
    }
}

/// Forwards every delivered email to the test
struct RecordingSender {
    tx: mpsc::UnboundedSender<EmailRequest>,
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, email: &EmailRequest) -> Result<(), Error> {
        let _ = self.tx.send(email.clone());
        Ok(())
    }
}

/// Rejects every delivery, like an unreachable relay
struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    async fn send(&self, _email: &EmailRequest) -> Result<(), Error> {
        Err(Error::Internal {
            operation: "send email: relay unreachable".to_string(),
        })
    }
}

/// The full router over a memory store, with the test MASTER account seeded.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<dyn Store>,
    outbox: Mutex<mpsc::UnboundedReceiver<EmailRequest>>,
}

impl TestApp {
    pub async fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::build(Arc::new(RecordingSender { tx }), rx).await
    }

    pub async fn with_failing_email() -> Self {
        // Nothing is ever recorded; the sender half is dropped straight away
        let (_, rx) = mpsc::unbounded_channel();
        Self::build(Arc::new(FailingSender), rx).await
    }

    async fn build(sender: Arc<dyn NotificationSender>, outbox: mpsc::UnboundedReceiver<EmailRequest>) -> Self {
        let app = Application::new_with_sender(create_test_config(), sender)
            .await
            .expect("Failed to create application");
        let (server, state) = app.into_test_server();

        Self {
            server,
            store: state.store,
            outbox: Mutex::new(outbox),
        }
    }

    /// Wait for the next email the background worker delivered
    pub async fn next_email(&self) -> EmailRequest {
        let mut outbox = self.outbox.lock().await;
        tokio::time::timeout(Duration::from_secs(5), outbox.recv())
            .await
            .expect("Timed out waiting for an email")
            .expect("Email outbox closed")
    }

    pub async fn disable(&self, id: AccountId) {
        let update = AccountStatusUpdate {
            is_enabled: Some(false),
            is_banned: None,
        };
        self.store
            .set_account_status(id, &update)
            .await
            .expect("Failed to disable account")
            .expect("Account to disable does not exist");
    }
}

pub async fn register_user(app: &TestApp, email: &str, password: &str) -> AuthResponse {
    let response = app
        .server
        .post("/auth/register")
        .json(&json!({
            "name": "Test",
            "lastName": "User",
            "email": email,
            "password": password,
        }))
        .await;
    response.assert_status_ok();
    response.json()
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> AuthResponse {
    let response = app
        .server
        .post("/auth/token")
        .json(&json!({"email": email, "password": password}))
        .await;
    response.assert_status_ok();
    response.json()
}
