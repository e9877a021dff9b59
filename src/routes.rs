use crate::handlers;
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("ignoring invalid cors origin {}: {}", origin, err);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderName::from_static("x-request-id"),
        ]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/quizzes", post(handlers::create_quiz).get(handlers::list_quizzes))
        .route("/api/v1/quizzes/upload", post(handlers::upload_quiz))
        .route("/api/v1/quizzes/preview", post(handlers::preview_quiz))
        .route(
            "/api/v1/quizzes/:id",
            get(handlers::get_quiz).delete(handlers::delete_quiz),
        )
        .route("/api/v1/attempts", post(handlers::submit_attempt))
        .route("/api/v1/attempts/:username", get(handlers::attempt_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
