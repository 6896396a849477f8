use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::errors::{describe_data_error, AppError};
use crate::models::Validate;

/// JSON body extractor that also runs [`Validate`].
///
/// Malformed, mistyped or out-of-range bodies are rejected with a 422 and a
/// per-field error list before the handler runs. A body sent without any
/// `Content-Type` is still read as JSON; a non-JSON content type is rejected.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let raw = if req.headers().contains_key(header::CONTENT_TYPE) {
            let Json(raw) = Json::<Value>::from_request(req, state).await?;
            raw
        } else {
            let bytes = Bytes::from_request(req, state).await?;
            let Json(raw) = Json::<Value>::from_bytes(&bytes)?;
            raw
        };

        let value = T::deserialize(&raw).map_err(|err| {
            let mut errors = T::diagnose(&raw);
            if errors.is_empty() {
                errors.push(describe_data_error(&err.to_string()));
            }
            AppError::Validation(errors)
        })?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
