//! Request extractors whose rejections are [`AppError`]s, so malformed
//! paths, query strings and form bodies get the same 404 / 400 handling as
//! errors raised by handlers.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Form,
};
use axum_valid::{Valid, ValidRejection};
use serde::de::DeserializeOwned;
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::errors::AppError;

/// Path parameters. A segment that does not parse names no page: 404.
#[derive(Debug)]
pub struct PathParam<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => {
                debug!("Path rejected: {}", rejection.body_text());
                Err(AppError::NotFound)
            }
        }
    }
}

/// Query string checked with `axum-valid`.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync + 'static,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Valid::<Query<T>>::from_request_parts(parts, state).await {
            Ok(Valid(Query(value))) => Ok(ValidQuery(value)),
            Err(ValidRejection::Valid(errors)) => Err(errors.into()),
            Err(ValidRejection::Inner(rejection)) => {
                Err(AppError::BadRequest(rejection.body_text()))
            }
        }
    }
}

/// Urlencoded form body, validated before the handler sees it.
#[derive(Debug)]
pub struct ValidForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidForm(value))
    }
}

/// Rejects values that are empty once surrounding whitespace is removed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Erin").is_ok());
        assert!(not_blank(" x ").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank("   \t").is_err());
    }
}
