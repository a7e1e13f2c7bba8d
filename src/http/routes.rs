use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/session/init", post(handlers::init_session))
        .route(
            "/session/init-with-lesson",
            post(handlers::init_session_with_lesson),
        )
        .route("/session/status", get(handlers::session_status))
        .route("/session/close", delete(handlers::close_session))
        // Audio streaming socket
        .route("/ws/interview/:session_id", get(handlers::interview_socket))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
