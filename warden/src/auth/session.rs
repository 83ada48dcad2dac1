//! Access token creation and verification, plus opaque token generation.
//!
//! Access tokens are HS256 JWTs carrying `sub` (account id), `iss`, `iat`, `exp` and the
//! `email`/`role` claims. They are never stored: [`TokenCodec::verify`] checks signature, issuer
//! and expiry against the current wall clock, and the request gate re-checks live account state.
//!
//! Refresh tokens and password reset tokens are opaque strings from [`issue_opaque_token`].

use std::fmt;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    errors::Error,
    types::{AccountId, Role},
};

/// Random bytes behind every opaque token (256 bits)
const OPAQUE_TOKEN_BYTES: usize = 32;

/// JWT access token claims
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,   // Subject (account ID)
    pub iss: String,   // Issuer
    pub iat: i64,      // Issued at
    pub exp: i64,      // Expiration time
    pub email: String, // Account email
    pub role: Role,    // Account role
}

/// Identity recovered from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub account_id: AccountId,
    pub email: String,
    pub role: Role,
}

/// Uniform verification failure; the cause is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid access token")]
pub struct InvalidToken;

/// Signs and verifies access tokens with a key fixed at startup.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("issuer", &self.issuer).finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // Expiry is exact: a token is dead the second it expires
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer,
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_ref().ok_or_else(|| Error::Internal {
            operation: "create token codec: secret_key is required".to_string(),
        })?;
        Ok(Self::new(secret_key.expose().as_bytes(), config.auth.jwt.issuer.clone()))
    }

    /// Create a signed access token valid for `ttl` from now
    pub fn issue_access_token(&self, account_id: AccountId, email: &str, role: Role, ttl: Duration) -> Result<String, Error> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: account_id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            email: email.to_string(),
            role,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })
    }

    /// Verify and decode an access token
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, InvalidToken> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => tracing::debug!("Access token expired"),
                jsonwebtoken::errors::ErrorKind::InvalidSignature => tracing::debug!("Access token signature mismatch"),
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => tracing::debug!("Access token issuer mismatch"),
                _ => tracing::debug!("Malformed access token: {}", e),
            }
            InvalidToken
        })?;

        let claims = token_data.claims;
        let account_id = claims.sub.parse::<AccountId>().map_err(|_| {
            tracing::debug!("Access token subject is not an account id");
            InvalidToken
        })?;

        Ok(VerifiedToken {
            account_id,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Generate a URL-safe, unpadded, cryptographically random token
pub fn issue_opaque_token() -> String {
    let mut token_bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut token_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}
