//! Request gate and route-prefix authorization.
//!
//! [`authenticate`] runs first on every request. A request without a bearer credential passes
//! through unidentified; a request with one is either identified or rejected outright. [`authorize`]
//! then applies the [`AccessPolicy`](crate::auth::access::AccessPolicy) to whatever identity was
//! established.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use crate::{
    AppState,
    auth::{
        current_user::CurrentAccount,
        gate::{GateOutcome, can_authenticate},
    },
    errors::{Error, Result},
};

const TOKEN_INVALID: &str = "token invalid";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Resolve the caller from a bearer access token, if one was presented
/// Returns:
/// - None: No Authorization header or not a Bearer credential
/// - Some(Ok(account)): Token valid and the live account may authenticate
/// - Some(Err(error)): Token present but rejected
async fn try_bearer_auth(headers: &HeaderMap, state: &AppState) -> Option<Result<CurrentAccount>> {
    let token = bearer_token(headers)?;

    let verified = match state.sessions.codec().verify(token) {
        Ok(verified) => verified,
        Err(_) => {
            return Some(Err(Error::Unauthenticated {
                message: Some(TOKEN_INVALID.to_string()),
            }));
        }
    };

    // Any status, so a disabled account is reported as disabled rather than unknown
    let account = match state.store.find_account_by_id(verified.account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            debug!("Access token subject {} no longer exists", verified.account_id);
            return Some(Err(Error::Unauthenticated {
                message: Some(TOKEN_INVALID.to_string()),
            }));
        }
        Err(e) => return Some(Err(e.into())),
    };

    match can_authenticate(&account) {
        GateOutcome::Allowed => Some(Ok(CurrentAccount::from(&account))),
        GateOutcome::Disabled => Some(Err(Error::Unauthenticated {
            message: Some("associated user does not exist".to_string()),
        })),
        GateOutcome::Banned => Some(Err(Error::Forbidden {
            message: "user is temporarily disabled".to_string(),
        })),
    }
}

/// Establish the caller's identity from the `Authorization: Bearer` header
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    if let Some(result) = try_bearer_auth(request.headers(), &state).await {
        let account = result?;
        trace!("Authenticated account {} with role {}", account.id, account.role);
        request.extensions_mut().insert(account);
    }

    Ok(next.run(request).await)
}

/// Enforce the route-prefix access rules
pub async fn authorize(State(state): State<AppState>, request: Request, next: Next) -> Result<Response> {
    let role = request.extensions().get::<CurrentAccount>().map(|account| account.role);
    state.access_policy.check(request.uri().path(), role)?;

    Ok(next.run(request).await)
}
