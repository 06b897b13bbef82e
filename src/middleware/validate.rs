//! Declarative request validation.
//!
//! Request bodies derive [`validator::Validate`]; [`ValidatedJson`] and
//! [`validate_fields`] run those rules before a handler sees the data and
//! collapse any failure into `ValidationFailed`.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// JSON body that has passed its `Validate` rules.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!("Rejecting JSON body: {}", e);
            ApiError::ValidationFailed
        })?;

        check(&value)?;
        Ok(ValidatedJson(value))
    }
}

/// Build `T` from multipart text fields and run its rules.
pub fn validate_fields<T>(fields: &HashMap<String, String>) -> Result<T, ApiError>
where
    T: DeserializeOwned + Validate,
{
    let object = fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect::<serde_json::Map<_, _>>();

    let value: T = serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
        tracing::debug!("Rejecting form fields: {}", e);
        ApiError::ValidationFailed
    })?;

    check(&value)?;
    Ok(value)
}

fn check<T: Validate>(value: &T) -> Result<(), ApiError> {
    value.validate().map_err(|errors| {
        tracing::debug!("Validation failed: {}", errors);
        ApiError::ValidationFailed
    })
}

/// ASCII letters only, like a classic `isAlpha` check.
pub fn validate_alphabetic(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphabetic"))
    }
}

/// Canonical form for stored and looked-up emails: trimmed and lowercased;
/// gmail addresses additionally drop dots and `+tags` in the local part and
/// use `gmail.com`.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.rsplit_once('@') else {
        return email;
    };

    match domain {
        "gmail.com" | "googlemail.com" => {
            let local = local.split('+').next().unwrap_or_default().replace('.', "");
            format!("{}@gmail.com", local)
        }
        _ => email,
    }
}
