use crate::db::errors::DbError;
use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

use crate::AppState;

const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred. Please contact support if the problem persists.";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Your account has been disabled. Please contact support.")]
    AccountDisabled,

    #[error("Your account has been banned. Please contact support.")]
    AccountBanned,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    /// The presented refresh token existed but was past expiry; it has been deleted
    #[error("Refresh token has expired. Please login again.")]
    RefreshTokenExpired,

    #[error("Invalid or expired password reset token")]
    InvalidResetToken,

    #[error("Password reset token has expired. Please request a new one.")]
    ResetTokenExpired,

    /// Authentication required but not provided, or the presented credential was rejected
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Caller is identified but not allowed: banned, wrong role or outside their hierarchy
    #[error("{message}")]
    Forbidden { message: String },

    #[error("Email not found: {email}")]
    EmailNotFound { email: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    #[error("Email {email} is already registered. Please use a different email.")]
    DuplicateEmail { email: String },

    /// Request body failed field validation
    #[error("Validation failed for one or more fields")]
    Validation { field_errors: Vec<FieldError> },

    /// Invalid request data that is not attributable to a single field
    #[error("{message}")]
    BadRequest { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub rejected_value: Option<serde_json::Value>,
    pub message: String,
}

/// Body shared by every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    /// HTTP reason phrase for `status`
    pub error: String,
    pub message: String,
    /// Request path that produced the error
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<FieldError>>,
    /// Internal failure detail, only present in development mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Full internal failure text, kept out of the body unless development mode asks for it.
#[derive(Debug, Clone)]
struct InternalDetail(String);

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials
            | Error::InvalidRefreshToken
            | Error::RefreshTokenExpired
            | Error::InvalidResetToken
            | Error::ResetTokenExpired
            | Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::AccountDisabled | Error::AccountBanned | Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::EmailNotFound { .. } | Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateEmail { .. } => StatusCode::CONFLICT,
            Error::Validation { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Internal { .. } | Error::Other(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            },
            other => other.to_string(),
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = camel_case(&field);
                // Never echo a rejected password back
                let echo_value = !field.to_lowercase().contains("password");
                errors.iter().map(move |e| FieldError {
                    field: field.clone(),
                    rejected_value: e.params.get("value").filter(|_| echo_value).cloned(),
                    message: e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()),
                })
            })
            .collect();
        field_errors.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.message.cmp(&b.message)));

        Error::Validation { field_errors }
    }
}

/// Request field names are camelCase on the wire.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            e if e.is_internal() => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Validation { .. } | Error::BadRequest { .. } | Error::NotFound { .. } | Error::EmailNotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
            Error::DuplicateEmail { .. } | Error::Database(_) => {
                tracing::warn!("Conflict error: {}", self);
            }
            _ => {
                tracing::warn!("Authentication error: {}", self);
            }
        }

        let status = self.status_code();
        let field_errors = match &self {
            Error::Validation { field_errors } => Some(field_errors.clone()),
            _ => None,
        };
        let body = ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.user_message(),
            path: String::new(),
            field_errors,
            details: None,
        };

        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        if self.is_internal() {
            response.extensions_mut().insert(InternalDetail(format!("{self:#}")));
        }
        response
    }
}

/// Completes error bodies with request-scoped data: the request path, and in development mode the
/// internal failure detail.
pub async fn complete_error_response(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(mut body) = response.extensions().get::<ErrorResponse>().cloned() else {
        return response;
    };
    body.path = path;
    if state.config.dev_mode {
        body.details = response.extensions().get::<InternalDetail>().map(|d| d.0.clone());
    }

    let (parts, _) = response.into_parts();
    match serde_json::to_vec(&body) {
        Ok(bytes) => Response::from_parts(parts, Body::from(bytes)),
        Err(e) => {
            tracing::error!("Failed to serialize error response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
