use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::Error;

/// JSON body that has passed its `validator` rules.
///
/// A body that is not valid JSON for `T` is a [`Error::BadRequest`]; one that parses but breaks a
/// field rule is a [`Error::Validation`] listing every offending field.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| Error::BadRequest {
            message: format!("Malformed request body: {}", rejection.body_text()),
        })?;

        value.validate()?;
        Ok(Self(value))
    }
}

/// Path parameters that render a parse failure as a [`Error::BadRequest`] body.
#[derive(Debug, Clone)]
pub struct ParsedPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ParsedPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await.map_err(|rejection| Error::BadRequest {
            message: format!("Invalid path parameter: {}", rejection.body_text()),
        })?;
        Ok(Self(value))
    }
}
