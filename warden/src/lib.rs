//! # warden: account authentication service
//!
//! `warden` issues and rotates credentials for a three-level account hierarchy
//! (`MASTER > ADMIN > USER`). Clients register or log in to receive a short-lived signed access
//! token and a longer-lived opaque refresh token; refresh tokens are single use and rotate on every
//! refresh. Forgotten passwords are recovered through an emailed, time-limited reset link.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Persistence goes through the
//! [`db::store`] traits, backed by PostgreSQL in production or an in-process store for development
//! and tests.
//!
//! ### Request Flow
//!
//! Every request passes through two middleware before reaching a handler:
//!
//! 1. [`auth::middleware::authenticate`] resolves a bearer access token to the live account and
//!    rejects tokens whose account is missing, disabled or banned, whatever route they target.
//! 2. [`auth::middleware::authorize`] matches the path against the ordered
//!    [`auth::access::AccessPolicy`] rules and rejects callers without a permitted role.
//!
//! Handlers then apply the role hierarchy ([`auth::hierarchy`]) to the specific account they act
//! on. Errors from any stage are rendered by [`errors::Error`] into a single JSON body shape.
//!
//! ### Core Components
//!
//! The **auth layer** ([`auth`]) holds the token codec, the account gate, the hierarchy rules and
//! the [`auth::manager::SessionManager`] that runs the login, registration, refresh and password
//! reset flows.
//!
//! The **notification layer** ([`notifications`], [`email`]) delivers password reset emails from a
//! background worker so that request latency never depends on the mail relay.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use warden::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = warden::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     warden::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod notifications;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use axum::{
    Router, http,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;

use crate::{
    auth::{access::AccessPolicy, manager::SessionManager, password::PasswordService},
    config::{CorsOrigin, DatabaseConfig},
    db::{
        memory::MemoryStore,
        models::accounts::AccountCreateDBRequest,
        postgres::PgStore,
        store::Store,
    },
    email::EmailService,
    errors::complete_error_response,
    notifications::NotificationSender,
    openapi::ApiDoc,
    types::{AccountId, Role},
};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .sessions(sessions)
///     .access_policy(access_policy)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    /// Runs the credential flows and owns the notification dispatcher
    pub sessions: Arc<SessionManager>,
    pub access_policy: Arc<AccessPolicy>,
}

/// Get the warden database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial MASTER account, or reset its password if the email is already registered.
///
/// Called on every startup, so changing `admin_password` and restarting is how a lost MASTER
/// password is recovered.
#[instrument(skip_all)]
pub async fn create_initial_master_account(
    email: &str,
    password: &str,
    store: &dyn Store,
    passwords: &PasswordService,
) -> errors::Result<AccountId> {
    let password_hash = passwords.hash(password).await?;

    if let Some(existing) = store.find_account_by_email(email).await? {
        store.update_password(existing.id, &password_hash).await?;
        if existing.role != Role::Master {
            warn!(account_id = existing.id, role = %existing.role, "Configured admin account is not a MASTER account");
        }
        debug!(account_id = existing.id, "Updated initial MASTER account password");
        return Ok(existing.id);
    }

    let created = store
        .create_account(&AccountCreateDBRequest {
            name: "Master".to_string(),
            last_name: "Account".to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::Master,
            created_by: None,
        })
        .await?;

    info!(account_id = created.id, "Created initial MASTER account");
    Ok(created.id)
}

/// Connects the configured backend and returns the store, plus the pool when it is PostgreSQL
async fn setup_database(config: &Config) -> anyhow::Result<(Arc<dyn Store>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let pg_pool = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(pool.acquire_timeout)
                .idle_timeout(pool.idle_timeout)
                .max_lifetime(pool.max_lifetime)
                .connect(url)
                .await?;
            migrator().run(&pg_pool).await?;
            let store: Arc<dyn Store> = Arc::new(PgStore::new(pg_pool.clone()));
            Ok((store, Some(pg_pool)))
        }
        DatabaseConfig::Memory => {
            info!("Using in-memory store: data will be lost on shutdown");
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            Ok((store, None))
        }
    }
}

async fn seed_master_account(config: &Config, store: &dyn Store, passwords: &PasswordService) -> anyhow::Result<()> {
    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            create_initial_master_account(email, password.expose(), store, passwords)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create initial MASTER account: {}", e))?;
        }
        (Some(_), None) => warn!("admin_email is set without admin_password, skipping initial MASTER account"),
        _ => {}
    }
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    // A literal "*" in an origin list is rejected by tower-http, so a wildcard means any origin
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<http::HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with every endpoint and middleware.
///
/// Layer order, outermost first: tracing, CORS, error body completion, the request gate
/// ([`authenticate`](auth::middleware::authenticate)) and route authorization.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/auth/token", post(api::handlers::auth::login))
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/refresh-token", post(api::handlers::auth::refresh_token))
        .route("/auth/request-password-reset", post(api::handlers::auth::request_password_reset))
        .route("/auth/reset-password", post(api::handlers::auth::reset_password));

    let account_routes = Router::new()
        .route("/user/me", get(api::handlers::users::get_current_account))
        .route("/admin/users", post(api::handlers::users::provision_account))
        .route("/admin/users/{id}", get(api::handlers::users::get_account))
        .route("/admin/users/{id}/status", patch(api::handlers::users::update_account_status))
        .route("/master/users/{id}", delete(api::handlers::users::purge_account));

    let router = Router::new()
        .route("/public/health", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(account_routes)
        .with_state(state.clone())
        .merge(Scalar::with_url("/public/docs", ApiDoc::openapi()));

    let router = router
        .layer(from_fn_with_state(state.clone(), auth::middleware::authorize))
        .layer(from_fn_with_state(state.clone(), auth::middleware::authenticate))
        .layer(from_fn_with_state(state.clone(), complete_error_response))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct.
///
/// 1. **Create**: [`Application::new`] connects storage, seeds the MASTER account and starts the
///    notification worker
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, drains the worker and closes the pool
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: Option<PgPool>,
    notifier_handle: JoinHandle<()>,
    shutdown_token: CancellationToken,
}

impl Application {
    /// Create a new application instance that delivers email through the configured transport
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let sender = EmailService::new(&config.email).map_err(|e| anyhow::anyhow!("Failed to set up email transport: {}", e))?;
        Self::new_with_sender(config, Arc::new(sender)).await
    }

    /// Create a new application instance with an explicit notification sender
    pub async fn new_with_sender(config: Config, sender: Arc<dyn NotificationSender>) -> anyhow::Result<Self> {
        debug!("Starting warden with configuration: {:#?}", config);

        let (store, pool) = setup_database(&config).await?;

        let shutdown_token = CancellationToken::new();
        let (dispatcher, notifier_handle) = notifications::start(&config.notifications, sender, shutdown_token.clone());

        let sessions = SessionManager::new(&config, store.clone(), dispatcher)?;
        seed_master_account(&config, store.as_ref(), sessions.passwords()).await?;
        let app_state = AppState::builder()
            .config(config.clone())
            .store(store)
            .sessions(Arc::new(sessions))
            .access_policy(Arc::new(AccessPolicy::new(config.auth.access_rules.clone())))
            .build();

        let router = build_router(app_state.clone())?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
            notifier_handle,
            shutdown_token,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, AppState) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.app_state)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("warden listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Request handlers are gone, so no new notifications can arrive
        drop(self.app_state);
        info!("Stopping notification worker...");
        self.shutdown_token.cancel();
        if let Err(e) = self.notifier_handle.await {
            tracing::error!("Notification worker failed: {}", e);
        }

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{TEST_MASTER_EMAIL, TEST_MASTER_PASSWORD, TestApp, create_test_config};
    use axum::http::{HeaderValue, Method, StatusCode, header};

    #[tokio::test]
    async fn test_health_and_docs_are_public() {
        let app = TestApp::new().await;

        let health = app.server.get("/public/health").await;
        health.assert_status_ok();
        health.assert_text("OK");

        app.server.get("/public/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_unknown_route_requires_authentication() {
        let app = TestApp::new().await;

        app.server.get("/elsewhere").await.assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_initial_master_is_seeded_and_idempotent() {
        let app = TestApp::new().await;
        let passwords = PasswordService::new((&create_test_config().auth.password).into());

        let seeded = app.store.find_account_by_email(TEST_MASTER_EMAIL).await.unwrap().unwrap();
        assert_eq!(seeded.role, Role::Master);
        assert!(passwords.verify(TEST_MASTER_PASSWORD, &seeded.password_hash).await.unwrap());

        let id = create_initial_master_account(TEST_MASTER_EMAIL, "rotated-password", app.store.as_ref(), &passwords)
            .await
            .unwrap();
        assert_eq!(id, seeded.id);

        let updated = app.store.find_account_by_id(id).await.unwrap().unwrap();
        assert!(passwords.verify("rotated-password", &updated.password_hash).await.unwrap());
        assert!(!passwords.verify(TEST_MASTER_PASSWORD, &updated.password_hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_bearer_header() {
        let app = TestApp::new().await;

        let response = app
            .server
            .method(Method::OPTIONS, "/auth/token")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
            .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("POST"))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                HeaderValue::from_static("authorization,content-type"),
            )
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    }

    #[test]
    fn test_cors_layer_accepts_explicit_origins() {
        let mut config = create_test_config();
        config.auth.cors.allowed_origins = vec![CorsOrigin::Url("https://app.example.com".parse().unwrap())];
        config.auth.cors.allow_credentials = true;

        assert!(create_cors_layer(&config).is_ok());
    }

    #[test]
    fn test_migrations_are_embedded() {
        assert!(migrator().iter().count() >= 2);
    }
}
