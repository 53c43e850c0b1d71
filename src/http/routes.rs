use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Voice exchange
        .route("/start_recording", post(handlers::start_recording))
        .route("/stop_recording", post(handlers::stop_recording))
        // Text exchange
        .route("/send_text", post(handlers::send_text))
        // Playback and history control
        .route("/stop_speaking", post(handlers::stop_speaking))
        .route("/clear_history", post(handlers::clear_history))
        // Probes
        .route("/status", get(handlers::get_status))
        .route("/history", get(handlers::get_history))
        // Request logging plus CORS for the browser front end
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
