use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use shelfhound_core::{IndexerHealth, SanitizedConfig};

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Serialize)]
pub struct SearcherStatusResponse {
    pub backend: String,
    pub health: IndexerHealth,
}

/// GET /api/v1/searcher/status
///
/// Probe the indexer aggregation service. Never fails; an unreachable
/// service reports `down`.
pub async fn searcher_status(State(state): State<Arc<AppState>>) -> Json<SearcherStatusResponse> {
    let searcher = state.service().engine().searcher();
    Json(SearcherStatusResponse {
        backend: searcher.name().to_string(),
        health: searcher.probe().await,
    })
}
