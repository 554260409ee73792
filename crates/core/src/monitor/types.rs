//! Types for the download monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::searcher::SearchError;
use crate::submitter::SubmitError;
use crate::torrent_client::TorrentClientError;

/// Errors that can occur while monitoring downloads.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("download already tracked: {0}")]
    AlreadyTracked(String),

    #[error("download client error: {0}")]
    TorrentClient(#[from] TorrentClientError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("submit error: {0}")]
    Submit(#[from] SubmitError),
}

/// Lifecycle phase of a tracked download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    Tracking,
    Stalled,
    Retrying,
    Completed,
    Failed,
}

impl DownloadPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadPhase::Completed | DownloadPhase::Failed)
    }
}

/// A submitted download under supervision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedDownload {
    /// Info hash (lowercase).
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Who asked for it; events are routed back here.
    pub owner: String,
    pub started_at: DateTime<Utc>,
    /// A completion or failure notification has gone out. Never reset.
    pub notified: bool,
    /// Replacement attempts made so far in this lineage.
    pub retry_count: u32,
    pub stall_detected: bool,
    /// When progress last changed (or tracking started).
    pub last_progress_check: DateTime<Utc>,
    /// 0.0 - 1.0
    pub last_progress: f64,
    /// Query that found the release; required for replacement searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Locator that was submitted; excluded from replacement searches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub phase: DownloadPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackedDownload {
    pub fn new(
        hash: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            hash: hash.into().to_lowercase(),
            name: name.into(),
            owner: owner.into(),
            started_at: now,
            notified: false,
            retry_count: 0,
            stall_detected: false,
            last_progress_check: now,
            last_progress: 0.0,
            search_query: None,
            locator: None,
            phase: DownloadPhase::Tracking,
            completed_at: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.search_query = query.filter(|q| !q.trim().is_empty());
        self
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Eligible for the stall pass.
    pub fn is_watchable(&self) -> bool {
        !self.notified && !self.stall_detected && self.phase == DownloadPhase::Tracking
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.notified = true;
        self.phase = DownloadPhase::Completed;
        self.completed_at = Some(now);
        self.last_progress = 1.0;
    }

    pub fn mark_failed(&mut self) {
        self.notified = true;
        self.phase = DownloadPhase::Failed;
    }

    /// Back to plain tracking after a replacement attempt that went nowhere.
    /// The stall clock restarts; `retry_count` is kept.
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.stall_detected = false;
        self.phase = DownloadPhase::Tracking;
        self.last_progress_check = now;
    }
}

/// Snapshot of the monitor for status endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub enabled: bool,
    pub tracked: usize,
    pub downloads: Vec<TrackedDownload>,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Another tick was still running; nothing was done.
    pub skipped: bool,
    pub completed: Vec<String>,
    pub progressed: usize,
    pub stalled: Vec<String>,
    /// (old hash, new hash)
    pub replaced: Vec<(String, String)>,
    pub failed: Vec<String>,
    pub collected: usize,
}

impl TickReport {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}
