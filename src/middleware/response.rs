use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;
use super::upload::{discard_file, DiscardUpload};

/// Terminal error stage. Every error already renders as `{message}` through
/// [`ApiError`]; this layer removes the upload belonging to a failed request.
pub async fn error_responder(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    if let Some(DiscardUpload(path)) = response.extensions_mut().remove::<DiscardUpload>() {
        if response.status().is_client_error() || response.status().is_server_error() {
            discard_file(&path).await;
        }
    }

    response
}

/// Fallback for unmatched routes
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
