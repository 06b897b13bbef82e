use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::{generate_jwt, hash_password, verify_password, Claims, JwtError};
use crate::config::SecurityConfig;
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::middleware::validate::validate_alphabetic;
use crate::middleware::{normalize_email, validate_fields, ImageUpload, UploadRejection, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(length(min = 1), custom = "validate_alphabetic")]
    pub name: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// GET /api/users - every user, without password hashes
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = state.store.list_users().await.map_err(|e| {
        tracing::error!("Listing users failed: {}", e);
        ApiError::StoreUnavailable
    })?;

    Ok(Json(json!({ "users": users })))
}

/// POST /api/users/signup - multipart `name`, `email`, `password` + `image`
///
/// Responds 201 with `{userId, email, token}`. Any store, hashing or signing
/// failure is reported as the same generic `SignupFailed`.
pub async fn signup(
    State(state): State<AppState>,
    upload: ImageUpload,
) -> Result<(StatusCode, Json<Value>), UploadRejection> {
    let image = upload.image.clone();
    register(&state, upload)
        .await
        .map_err(|e| e.discarding(image.as_ref()))
}

async fn register(state: &AppState, mut upload: ImageUpload) -> Result<(StatusCode, Json<Value>), ApiError> {
    if let Some(email) = upload.fields.get_mut("email") {
        *email = normalize_email(email);
    }
    let form: SignupForm = validate_fields(&upload.fields)?;
    let image = upload.require_image()?;

    let existing = state.store.find_user_by_email(&form.email).await.map_err(|e| {
        tracing::error!("Signup lookup failed: {}", e);
        ApiError::SignupFailed
    })?;
    if existing.is_some() {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(&form.password, state.config.security.bcrypt_cost)
        .await
        .map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ApiError::SignupFailed
        })?;

    let user = state
        .store
        .insert_user(NewUser {
            name: form.name,
            email: form.email,
            password_hash,
            image: image.path.clone(),
        })
        .await
        .map_err(|e| {
            if e.is_duplicate_key() {
                return ApiError::DuplicateEmail;
            }
            tracing::error!("Inserting user failed: {}", e);
            ApiError::SignupFailed
        })?;

    let token = issue_token(&user, &state.config.security).map_err(|e| {
        tracing::error!("Token signing failed: {}", e);
        ApiError::SignupFailed
    })?;

    tracing::info!(user_id = %user.id, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "userId": user.id, "email": user.email, "token": token })),
    ))
}

/// POST /api/users/login - JSON `{email, password}`
///
/// Unknown email and wrong password produce the same `InvalidCredentials`.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = normalize_email(&request.email);

    let user = state
        .store
        .find_user_by_email(&email)
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed: {}", e);
            ApiError::LoginFailed
        })?
        .ok_or(ApiError::InvalidCredentials)?;

    let valid = verify_password(&request.password, &user.password).await.map_err(|e| {
        tracing::error!("Password verification failed: {}", e);
        ApiError::LoginFailed
    })?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&user, &state.config.security).map_err(|e| {
        tracing::error!("Token signing failed: {}", e);
        ApiError::LoginFailed
    })?;

    Ok(Json(json!({ "userId": user.id, "email": user.email, "token": token })))
}

fn issue_token(user: &User, security: &SecurityConfig) -> Result<String, JwtError> {
    let claims = Claims::new(user.id, user.email.clone(), security.jwt_expiry_hours);
    generate_jwt(&claims, &security.jwt_secret)
}
