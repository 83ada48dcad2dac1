//! OpenAPI documentation for the HTTP API, served as a Scalar page at `/public/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors, types};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token returned by `/auth/token`, `/auth/register` or `/auth/refresh-token`:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Warden", description = "Account authentication and role hierarchy API"),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::register,
        api::handlers::auth::refresh_token,
        api::handlers::auth::request_password_reset,
        api::handlers::auth::reset_password,
        api::handlers::users::get_current_account,
        api::handlers::users::provision_account,
        api::handlers::users::get_account,
        api::handlers::users::update_account_status,
        api::handlers::users::purge_account,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::RegisterRequest,
            api::models::auth::RefreshTokenRequest,
            api::models::auth::PasswordResetRequest,
            api::models::auth::ResetPasswordRequest,
            api::models::auth::AuthResponse,
            api::models::auth::MessageResponse,
            api::models::users::UserInfo,
            api::models::users::AccountDetails,
            api::models::users::ProvisionAccountRequest,
            api::models::users::AccountStatusRequest,
            errors::ErrorResponse,
            errors::FieldError,
            types::Role,
        )
    ),
    tags(
        (name = "authentication", description = "Login, registration, token refresh and password reset. No token required."),
        (name = "accounts", description = "The caller's own account and management of accounts below the caller in the role hierarchy."),
    )
)]
pub struct ApiDoc;
