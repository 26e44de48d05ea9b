// src/extractors.rs

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// JSON body extractor that enforces the request schema.
///
/// Any body that fails to parse (wrong content type, bad syntax, wrong shape)
/// or fails `Validate` is rejected as `AppError::BadRequest` before the handler
/// runs.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            AppError::BadRequest(rejection.body_text())
        })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
