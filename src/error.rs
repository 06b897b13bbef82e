// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Every failure a request can end in. Each variant carries a fixed,
/// client-safe message; internal detail is logged where the error is mapped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    // 422 Unprocessable Entity
    #[error("Invalid inputs passed, please check your data")]
    ValidationFailed,
    #[error("An image file is required")]
    ImageRequired,
    #[error("{0}")]
    InvalidImage(&'static str),
    #[error("Could not create user, email already exists.")]
    DuplicateEmail,
    #[error("Could not find user with given id, place not created")]
    UserNotFound,

    // 401 Unauthorized
    #[error("Authentication failed")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),

    // 403 Forbidden
    #[error("Could not identify user, credentials seem to be wrong")]
    InvalidCredentials,

    // 404 Not Found
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Could not get coordinates for given address")]
    AddressNotFound,
    #[error("page does not exists")]
    RouteNotFound,

    // 500 Internal Server Error
    #[error("Error fetching users, please try again later")]
    StoreUnavailable,
    #[error("Signing up failed, please try again later")]
    SignupFailed,
    #[error("Could not login, please try again later")]
    LoginFailed,
    #[error("Could not create place, please try again.")]
    CreateFailed,
    #[error("Something went wrong, could not find place")]
    LookupFailed,
    #[error("Something went wrong, could not update place")]
    UpdateFailed,
    #[error("Something went wrong, could not delete place")]
    DeleteFailed,
    #[error("Could not reach the geocoding service, please try again later")]
    GeocodingFailed,
    #[error("Could not store the uploaded image, please try again")]
    UploadFailed,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationFailed
            | ApiError::ImageRequired
            | ApiError::InvalidImage(_)
            | ApiError::DuplicateEmail
            | ApiError::UserNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthenticated | ApiError::Forbidden(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::AddressNotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable
            | ApiError::SignupFailed
            | ApiError::LoginFailed
            | ApiError::CreateFailed
            | ApiError::LookupFailed
            | ApiError::UpdateFailed
            | ApiError::DeleteFailed
            | ApiError::GeocodingFailed
            | ApiError::UploadFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({ "message": self.to_string() })
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
