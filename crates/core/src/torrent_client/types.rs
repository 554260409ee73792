//! Types for download client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Retryable;

/// Errors that can occur during download client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Client rejected request (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Client error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Torrent rejected: {0}")]
    Rejected(String),
}

impl Retryable for TorrentClientError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            TorrentClientError::ConnectionFailed(_)
                | TorrentClientError::Timeout
                | TorrentClientError::Server { .. }
        )
    }
}

/// One item as reported by the download client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Number of connected seeders.
    pub seeders: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TorrentInfo {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Request to add a torrent by locator (magnet URI or .torrent URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrentRequest {
    pub urls: String,
    pub category: Option<String>,
}

impl AddTorrentRequest {
    pub fn url(locator: impl Into<String>) -> Self {
        Self {
            urls: locator.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Status filter understood by the client's listing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Downloading,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Completed => "completed",
            StatusFilter::Downloading => "downloading",
        }
    }
}

/// Filters for listing torrents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentFilters {
    pub status: StatusFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TorrentFilters {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn completed() -> Self {
        Self {
            status: StatusFilter::Completed,
            category: None,
        }
    }

    pub fn downloading() -> Self {
        Self {
            status: StatusFilter::Downloading,
            category: None,
        }
    }

    pub fn in_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }
}

/// Trait for download client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Submit a locator. The client assigns the hash; callers recover it by listing.
    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<(), TorrentClientError>;

    /// List torrents, optionally filtered.
    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError>;
}

/// Extract the info hash from a magnet URI, lowercased.
pub fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (scheme, query) = magnet.split_once('?')?;
    if !scheme.eq_ignore_ascii_case("magnet:") {
        return None;
    }

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .filter(|hash| !hash.is_empty())
        .map(|hash| hash.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_torrent_request_builder() {
        let req = AddTorrentRequest::url("magnet:?xt=urn:btih:abc123")
            .with_category("audiobooks");

        assert_eq!(req.urls, "magnet:?xt=urn:btih:abc123");
        assert_eq!(req.category.as_deref(), Some("audiobooks"));
    }

    #[test]
    fn test_filters() {
        assert_eq!(TorrentFilters::all().status, StatusFilter::All);
        let f = TorrentFilters::completed().in_category(Some("audiobooks".into()));
        assert_eq!(f.status.as_str(), "completed");
        assert_eq!(f.category.as_deref(), Some("audiobooks"));
        assert_eq!(TorrentFilters::downloading().status.as_str(), "downloading");
    }

    #[test]
    fn test_extract_hash_from_magnet() {
        let magnet = "magnet:?xt=urn:btih:abc123def456&dn=Test";
        assert_eq!(extract_hash_from_magnet(magnet), Some("abc123def456".to_string()));

        let magnet_upper = "magnet:?dn=Test&xt=urn:btih:ABC123DEF456";
        assert_eq!(extract_hash_from_magnet(magnet_upper), Some("abc123def456".to_string()));

        assert_eq!(extract_hash_from_magnet("not a magnet"), None);
        assert_eq!(extract_hash_from_magnet("magnet:?dn=Test"), None);
        assert_eq!(extract_hash_from_magnet("http://x/?xt=urn:btih:abc"), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TorrentClientError::ConnectionFailed("refused".into()).is_retryable());
        assert!(TorrentClientError::Timeout.is_retryable());
        assert!(TorrentClientError::Server {
            status: 500,
            message: String::new()
        }
        .is_retryable());
        assert!(!TorrentClientError::AuthenticationFailed("bad".into()).is_retryable());
        assert!(!TorrentClientError::Rejected("Fails.".into()).is_retryable());
    }
}
