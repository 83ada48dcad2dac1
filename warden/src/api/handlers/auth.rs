use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        extract::ValidatedJson,
        models::auth::{
            AuthResponse, LoginRequest, MessageResponse, PasswordResetRequest, RefreshTokenRequest, RegisterRequest,
            ResetPasswordRequest,
        },
    },
    auth::manager::NewAccount,
    errors::{Error, ErrorResponse},
};

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 403, description = "Account disabled or banned", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, Error> {
    let session = state.sessions.login(&request.email, &request.password).await?;
    Ok(Json(session.into()))
}

/// Register a new USER account and log it in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Account registered", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, Error> {
    let session = state
        .sessions
        .register(NewAccount {
            name: &request.name,
            last_name: &request.last_name,
            email: &request.email,
            password: &request.password,
        })
        .await?;
    Ok(Json(session.into()))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    request_body = RefreshTokenRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "New token pair issued", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse),
        (status = 403, description = "Account disabled or banned", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, Error> {
    let session = state.sessions.refresh(&request.refresh_token).await?;
    Ok(Json(session.into()))
}

/// Send a password reset link to a registered email
#[utoipa::path(
    post,
    path = "/auth/request-password-reset",
    request_body = PasswordResetRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Reset email queued", body = MessageResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Email not found", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, Error> {
    state.sessions.request_password_reset(&request.email).await?;
    Ok(Json(MessageResponse::new("Password reset email sent successfully")))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid or expired reset token", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    state
        .sessions
        .reset_password(&request.reset_token, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::{AuthResponse, MessageResponse};
    use crate::errors::ErrorResponse;
    use crate::test_utils::{TestApp, register_user};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_returns_session() {
        let app = TestApp::new().await;

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({"name": "Ada", "lastName": "Lovelace", "email": "a@x.com", "password": "password123"}))
            .await;

        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.token_type, "Bearer");
        assert_eq!(body.expires_in, 3600);
        assert_eq!(body.user.email, "a@x.com");
        assert_eq!(body.user.last_name, "Lovelace");
        assert_eq!(body.user.role, crate::types::Role::User);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let app = TestApp::new().await;
        register_user(&app, "a@x.com", "password123").await;

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({"name": "Ada", "lastName": "Lovelace", "email": "a@x.com", "password": "password123"}))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: ErrorResponse = response.json();
        assert_eq!(body.status, 409);
        assert_eq!(body.path, "/auth/register");
        assert_eq!(
            body.message,
            "Email a@x.com is already registered. Please use a different email."
        );
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let app = TestApp::new().await;

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({"name": "", "email": "not-an-email", "password": "password123"}))
            .await;

        response.assert_status_bad_request();
        let body: ErrorResponse = response.json();
        assert_eq!(body.message, "Validation failed for one or more fields");
        let field_errors = body.field_errors.unwrap();
        let fields: Vec<&str> = field_errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"lastName"));
        assert!(fields.contains(&"email"));
        assert!(!fields.contains(&"password"));

        let email_error = field_errors.iter().find(|e| e.field == "email").unwrap();
        assert_eq!(email_error.message, "Email must be valid");
        assert_eq!(email_error.rejected_value, Some(json!("not-an-email")));
    }

    #[tokio::test]
    async fn test_register_short_password() {
        let app = TestApp::new().await;

        let response = app
            .server
            .post("/auth/register")
            .json(&json!({"name": "Ada", "lastName": "Lovelace", "email": "a@x.com", "password": "short"}))
            .await;

        response.assert_status_bad_request();
        let body: ErrorResponse = response.json();
        let field_errors = body.field_errors.unwrap();
        assert_eq!(field_errors[0].field, "password");
        assert_eq!(field_errors[0].message, "Password must be at least 8 characters");
        assert_eq!(field_errors[0].rejected_value, None);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = TestApp::new().await;

        let response = app
            .server
            .post("/auth/token")
            .content_type("application/json")
            .text("{\"email\": ")
            .await;

        response.assert_status_bad_request();
        let body: ErrorResponse = response.json();
        assert!(body.message.starts_with("Malformed request body"));
    }

    #[tokio::test]
    async fn test_login_success_and_failures() {
        let app = TestApp::new().await;
        let registered = register_user(&app, "a@x.com", "password123").await;

        let response = app
            .server
            .post("/auth/token")
            .json(&json!({"email": "a@x.com", "password": "password123"}))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, registered.user.id);

        let wrong_password = app
            .server
            .post("/auth/token")
            .json(&json!({"email": "a@x.com", "password": "password124"}))
            .await;
        wrong_password.assert_status_unauthorized();

        let unknown_email = app
            .server
            .post("/auth/token")
            .json(&json!({"email": "nobody@x.com", "password": "password123"}))
            .await;
        unknown_email.assert_status_unauthorized();

        let wrong: ErrorResponse = wrong_password.json();
        let unknown: ErrorResponse = unknown_email.json();
        assert_eq!(wrong.message, "Invalid email or password");
        assert_eq!(wrong.message, unknown.message);
    }

    #[tokio::test]
    async fn test_login_disabled_account_forbidden() {
        let app = TestApp::new().await;
        let registered = register_user(&app, "a@x.com", "password123").await;
        app.disable(registered.user.id).await;

        let response = app
            .server
            .post("/auth/token")
            .json(&json!({"email": "a@x.com", "password": "password123"}))
            .await;

        response.assert_status_forbidden();
        let body: ErrorResponse = response.json();
        assert_eq!(body.message, "Your account has been disabled. Please contact support.");
    }

    #[tokio::test]
    async fn test_refresh_token_rotation() {
        let app = TestApp::new().await;
        let registered = register_user(&app, "a@x.com", "password123").await;

        let first = app
            .server
            .post("/auth/refresh-token")
            .json(&json!({"refreshToken": registered.refresh_token}))
            .await;
        first.assert_status_ok();
        let rotated: AuthResponse = first.json();
        assert_ne!(rotated.refresh_token, registered.refresh_token);

        let replay = app
            .server
            .post("/auth/refresh-token")
            .json(&json!({"refreshToken": registered.refresh_token}))
            .await;
        replay.assert_status_unauthorized();
        let body: ErrorResponse = replay.json();
        assert_eq!(body.message, "Invalid or expired refresh token");
    }

    #[tokio::test]
    async fn test_refresh_token_required() {
        let app = TestApp::new().await;

        let response = app.server.post("/auth/refresh-token").json(&json!({})).await;

        response.assert_status_bad_request();
        let body: ErrorResponse = response.json();
        assert_eq!(body.field_errors.unwrap()[0].message, "Refresh token is required");
    }

    #[tokio::test]
    async fn test_password_reset_round_trip() {
        let app = TestApp::new().await;
        let registered = register_user(&app, "a@x.com", "password123").await;

        let unknown = app
            .server
            .post("/auth/request-password-reset")
            .json(&json!({"email": "nobody@x.com"}))
            .await;
        unknown.assert_status_not_found();
        let body: ErrorResponse = unknown.json();
        assert_eq!(body.message, "Email not found: nobody@x.com");

        let requested = app
            .server
            .post("/auth/request-password-reset")
            .json(&json!({"email": "a@x.com"}))
            .await;
        requested.assert_status_ok();
        let body: MessageResponse = requested.json();
        assert_eq!(body.message, "Password reset email sent successfully");

        let account = app.store.find_account_by_id(registered.user.id).await.unwrap().unwrap();
        let reset_token = account.reset_token.unwrap();
        let expected_expiry = chrono::Utc::now() + chrono::Duration::minutes(15);
        let skew = (account.reset_token_expires_at.unwrap() - expected_expiry).num_seconds().abs();
        assert!(skew <= 5, "reset token expiry off by {skew}s");

        let reset = app
            .server
            .post("/auth/reset-password")
            .json(&json!({"resetToken": reset_token, "newPassword": "brand-new-password"}))
            .await;
        reset.assert_status_ok();
        let body: MessageResponse = reset.json();
        assert_eq!(body.message, "Password reset successfully");

        let reused = app
            .server
            .post("/auth/reset-password")
            .json(&json!({"resetToken": reset_token, "newPassword": "another-password"}))
            .await;
        reused.assert_status_unauthorized();

        app.server
            .post("/auth/token")
            .json(&json!({"email": "a@x.com", "password": "brand-new-password"}))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_reset_email_is_delivered_in_background() {
        let app = TestApp::new().await;
        register_user(&app, "a@x.com", "password123").await;

        app.server
            .post("/auth/request-password-reset")
            .json(&json!({"email": "a@x.com"}))
            .await
            .assert_status_ok();

        let email = app.next_email().await;
        assert_eq!(email.to, "a@x.com");
        assert_eq!(email.subject, "Password Reset Request");
        assert!(email.html_body.contains("http://localhost:3000/reset-password?token="));
    }

    #[tokio::test]
    async fn test_reset_succeeds_even_when_delivery_fails() {
        let app = TestApp::with_failing_email().await;
        register_user(&app, "a@x.com", "password123").await;

        app.server
            .post("/auth/request-password-reset")
            .json(&json!({"email": "a@x.com"}))
            .await
            .assert_status_ok();
    }
}
