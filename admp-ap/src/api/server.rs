//! HTTP server setup and routing

use crate::playback::TransportController;
use admp_common::events::EventBus;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub transport: Arc<TransportController>,
    pub events: EventBus,
}

/// Build the application router with all control routes.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Status and meters
        .route("/status", get(super::handlers::status))
        .route("/position", get(super::handlers::position))
        .route("/meters", get(super::handlers::meters))
        // File selection
        .route("/files", get(super::handlers::list_files))
        .route("/files/rescan", post(super::handlers::rescan_files))
        .route("/files/select", post(super::handlers::select_file))
        // Playback control
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/rewind", post(super::handlers::rewind))
        .route("/playback/loop", put(super::handlers::set_loop))
        .route("/playback/gain", put(super::handlers::set_gain))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
