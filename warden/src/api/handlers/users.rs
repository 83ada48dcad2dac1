//! Account endpoints for the caller and for administrators.
//!
//! The route prefix decides which roles get in at all (see
//! [`AccessPolicy`](crate::auth::access::AccessPolicy)); the handlers then apply the role
//! hierarchy to the specific target account.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::{
        extract::{ParsedPath, ValidatedJson},
        models::users::{AccountDetails, AccountStatusRequest, ProvisionAccountRequest, UserInfo},
    },
    auth::{current_user::CurrentAccount, hierarchy::can_access, manager::NewAccount},
    db::models::accounts::AccountStatusUpdate,
    errors::{Error, ErrorResponse},
    types::AccountId,
};

fn account_not_found(id: AccountId) -> Error {
    Error::NotFound {
        resource: "Account".to_string(),
        id: id.to_string(),
    }
}

fn access_denied() -> Error {
    Error::Forbidden {
        message: "Access denied".to_string(),
    }
}

/// Get the authenticated account
#[utoipa::path(
    get,
    path = "/user/me",
    tag = "accounts",
    responses(
        (status = 200, description = "Current account", body = UserInfo),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_account(
    State(state): State<AppState>,
    current: CurrentAccount,
) -> Result<Json<UserInfo>, Error> {
    let account = state
        .store
        .find_account_by_id(current.id)
        .await?
        .ok_or_else(|| account_not_found(current.id))?;
    Ok(Json(UserInfo::from(&account)))
}

/// Provision an account of a role the caller may create
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = ProvisionAccountRequest,
    tag = "accounts",
    responses(
        (status = 201, description = "Account created", body = AccountDetails),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Role not creatable by the caller", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(creator_id = current.id))]
pub async fn provision_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ValidatedJson(request): ValidatedJson<ProvisionAccountRequest>,
) -> Result<(StatusCode, Json<AccountDetails>), Error> {
    // Presence is checked by validation
    let role = request.role.ok_or_else(|| Error::BadRequest {
        message: "Role is required".to_string(),
    })?;

    let account = state
        .sessions
        .provision_account(
            &current,
            NewAccount {
                name: &request.name,
                last_name: &request.last_name,
                email: &request.email,
                password: &request.password,
            },
            role,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AccountDetails::from(account))))
}

/// View an account within the caller's hierarchy
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    tag = "accounts",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account details", body = AccountDetails),
        (status = 400, description = "Malformed account id", body = ErrorResponse),
        (status = 403, description = "Account outside the caller's hierarchy", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(target_id = id))]
pub async fn get_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ParsedPath(id): ParsedPath<AccountId>,
) -> Result<Json<AccountDetails>, Error> {
    let account = state
        .store
        .find_account_by_id(id)
        .await?
        .ok_or_else(|| account_not_found(id))?;

    if !can_access(current.as_requester(), account.id, account.created_by) {
        return Err(access_denied());
    }

    Ok(Json(AccountDetails::from(account)))
}

/// Enable, disable, ban or unban an account
#[utoipa::path(
    patch,
    path = "/admin/users/{id}/status",
    request_body = AccountStatusRequest,
    tag = "accounts",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Updated account", body = AccountDetails),
        (status = 400, description = "Malformed id or body, or nothing to change", body = ErrorResponse),
        (status = 403, description = "Own account or outside the caller's hierarchy", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(target_id = id))]
pub async fn update_account_status(
    State(state): State<AppState>,
    current: CurrentAccount,
    ParsedPath(id): ParsedPath<AccountId>,
    ValidatedJson(request): ValidatedJson<AccountStatusRequest>,
) -> Result<Json<AccountDetails>, Error> {
    if request.enabled.is_none() && request.banned.is_none() {
        return Err(Error::BadRequest {
            message: "At least one of enabled or banned must be provided".to_string(),
        });
    }
    if id == current.id {
        return Err(Error::Forbidden {
            message: "You cannot change the status of your own account".to_string(),
        });
    }

    let account = state
        .store
        .find_account_by_id(id)
        .await?
        .ok_or_else(|| account_not_found(id))?;
    if !can_access(current.as_requester(), account.id, account.created_by) {
        return Err(access_denied());
    }

    let update = AccountStatusUpdate {
        is_enabled: request.enabled,
        is_banned: request.banned,
    };
    let updated = state
        .store
        .set_account_status(id, &update)
        .await?
        .ok_or_else(|| account_not_found(id))?;

    tracing::info!(
        actor_id = current.id,
        enabled = updated.is_enabled,
        banned = updated.is_banned,
        "Account status changed"
    );
    Ok(Json(AccountDetails::from(updated)))
}

/// Permanently delete an account and its refresh tokens
#[utoipa::path(
    delete,
    path = "/master/users/{id}",
    tag = "accounts",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Malformed account id", body = ErrorResponse),
        (status = 403, description = "Own account", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(target_id = id))]
pub async fn purge_account(
    State(state): State<AppState>,
    current: CurrentAccount,
    ParsedPath(id): ParsedPath<AccountId>,
) -> Result<StatusCode, Error> {
    if id == current.id {
        return Err(Error::Forbidden {
            message: "You cannot delete your own account".to_string(),
        });
    }

    if !state.store.purge_account(id).await? {
        return Err(account_not_found(id));
    }

    tracing::info!(actor_id = current.id, "Account purged");
    Ok(StatusCode::NO_CONTENT)
}
