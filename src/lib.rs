pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod geocoding;
pub mod handlers;
pub mod middleware;
pub mod state;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::{DefaultBodyLimit, State},
    handler::HandlerWithoutStateExt,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::middleware::{error_responder, jwt_auth_middleware, route_not_found, upload_body_limit};
use crate::state::AppState;

const CORS_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PATCH, Method::DELETE];
const CORS_METHODS_VALUE: &str = "GET, POST, PATCH, DELETE";
const CORS_HEADERS_VALUE: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// The whole HTTP surface, wired to `state`.
pub fn app(state: AppState) -> Router {
    // Missing images answer like any other unmatched route
    let uploads = ServeDir::new(&state.config.uploads.dir).not_found_service(route_not_found.into_service());
    let upload_limit = upload_body_limit(&state.config.uploads);

    Router::new()
        .route("/health", get(health))
        .merge(user_routes(upload_limit))
        .merge(place_routes(state.clone(), upload_limit))
        .nest_service("/uploads/images", uploads)
        .fallback(route_not_found)
        // Global middleware, innermost first
        .layer(from_fn(error_responder))
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_METHODS_VALUE),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_HEADERS_VALUE),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn user_routes(upload_limit: usize) -> Router<AppState> {
    use handlers::public::users;

    Router::new()
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/signup",
            post(users::signup).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/users/login", post(users::login))
}

fn place_routes(state: AppState, upload_limit: usize) -> Router<AppState> {
    use handlers::{protected, public};

    let reads = Router::new()
        .route("/api/places/:pid", get(public::get_place_by_id))
        .route("/api/places/user/:uid", get(public::get_places_by_user_id));

    let writes = Router::new()
        .route(
            "/api/places",
            post(protected::create_place).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/places/:pid",
            patch(protected::update_place).delete(protected::delete_place),
        )
        .route_layer(from_fn_with_state(state, jwt_auth_middleware));

    reads.merge(writes)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(CORS_METHODS)
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
