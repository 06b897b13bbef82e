use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::state::AppState;

/// GET /api/places/:pid
pub async fn get_place_by_id(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const NOT_FOUND: ApiError = ApiError::NotFound("Could not find place with given id");

    let id = parse_id(&pid).ok_or(NOT_FOUND)?;
    let place = state
        .store
        .find_place_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Place lookup failed: {}", e);
            ApiError::LookupFailed
        })?
        .ok_or(NOT_FOUND)?;

    Ok(Json(json!({ "place": place })))
}

/// GET /api/places/user/:uid
///
/// A user without places answers 404 rather than an empty list.
pub async fn get_places_by_user_id(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const NOT_FOUND: ApiError = ApiError::NotFound("Could not find place with given user id");

    let creator = parse_id(&uid).ok_or(NOT_FOUND)?;
    let places = state.store.find_places_by_creator(creator).await.map_err(|e| {
        tracing::error!("Places lookup for user {} failed: {}", creator, e);
        ApiError::LookupFailed
    })?;

    if places.is_empty() {
        return Err(NOT_FOUND);
    }

    Ok(Json(json!({ "places": places })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use uuid::Uuid;

    use crate::testing::{request, send, TestApp};

    #[tokio::test]
    async fn unknown_and_malformed_place_ids_are_not_found() {
        let app = TestApp::new();

        for uri in [format!("/api/places/{}", Uuid::new_v4()), "/api/places/not-a-uuid".to_string()] {
            let (status, body) = send(app.router(), request("GET", &uri, None)).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["message"], "Could not find place with given id");
        }
    }

    #[tokio::test]
    async fn user_without_places_is_not_found() {
        let app = TestApp::new();
        let (user_id, _) = app.signup("Ada", "ada@example.com", "secret123").await;

        let (status, body) = send(app.router(), request("GET", &format!("/api/places/user/{}", user_id), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Could not find place with given user id");
    }

    #[tokio::test]
    async fn reads_are_public() {
        let app = TestApp::new();
        let (user_id, token) = app.signup("Ada", "ada@example.com", "secret123").await;
        let place = app.create_place(&token, "Empire State", "A famous tower", "20 W 34th St").await;

        let (status, body) = send(app.router(), request("GET", &format!("/api/places/{}", place["id"].as_str().unwrap()), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"]["title"], "Empire State");
        assert_eq!(body["place"]["creator"], user_id.to_string());
        assert!(body["place"]["location"]["lat"].is_number());

        let (status, body) = send(app.router(), request("GET", &format!("/api/places/user/{}", user_id), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["places"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn store_failure_is_a_lookup_failure() {
        let app = TestApp::new();
        app.store.fail_reads(true);

        let (status, body) = send(app.router(), request("GET", &format!("/api/places/{}", Uuid::new_v4()), None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Something went wrong, could not find place");
    }
}
