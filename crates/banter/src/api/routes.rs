//! API route definitions.

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // The browser client may be served from anywhere; there is no auth.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/sessions/{session_id}/activate",
            post(handlers::activate_session),
        )
        .route("/api/sessions/{session_id}", delete(handlers::delete_session))
        .route(
            "/api/sessions/{session_id}/name",
            put(handlers::rename_session),
        )
        .route("/api/history", get(handlers::get_history))
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route(
            "/api/history/messages/{index}",
            put(handlers::update_message),
        )
        .route("/api/history/messages", delete(handlers::delete_messages))
        .route("/api/reset", post(handlers::reset))
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}
