//! Tracked download handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use shelfhound_core::TrackedDownload;
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DownloadView {
    #[serde(flatten)]
    pub download: TrackedDownload,
    pub age_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct DownloadsResponse {
    pub running: bool,
    pub enabled: bool,
    pub tracked: usize,
    pub downloads: Vec<DownloadView>,
}

/// GET /api/v1/downloads
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> Json<DownloadsResponse> {
    let status = state.monitor().status().await;
    let now = Utc::now();

    Json(DownloadsResponse {
        running: status.running,
        enabled: status.enabled,
        tracked: status.tracked,
        downloads: status
            .downloads
            .into_iter()
            .map(|download| DownloadView {
                age_minutes: (now - download.started_at).num_minutes(),
                download,
            })
            .collect(),
    })
}

/// DELETE /api/v1/downloads/{hash}
///
/// Stop supervising a download. The client item itself is left alone.
pub async fn untrack_download(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<TrackedDownload>, StatusCode> {
    match state.monitor().untrack(&hash).await {
        Some(download) => {
            info!(hash = %download.hash, "Download untracked");
            Ok(Json(download))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}
