use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{downloads, handlers, requests};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/searcher/status", get(handlers::searcher_status))
        // Requests
        .route("/requests", post(requests::create_request))
        .route("/interpret", post(requests::interpret))
        // Downloads
        .route("/downloads", get(downloads::list_downloads))
        .route("/downloads/{hash}", delete(downloads::untrack_download))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
