//! Mock download client for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::torrent_client::{
    extract_hash_from_magnet, AddTorrentRequest, StatusFilter, TorrentClient, TorrentClientError,
    TorrentFilters, TorrentInfo,
};

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Records every submitted locator
/// - Items appear in listings as `Downloading` until `set_progress(hash, 1.0)`
/// - `set_register_on_add(false)` accepts submissions without listing them
/// - `set_next_error` fails the next call
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_torrent(AddTorrentRequest::url("magnet:?xt=urn:btih:abc")).await?;
/// client.set_progress("abc", 1.0).await;
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    added: Arc<RwLock<Vec<AddTorrentRequest>>>,
    /// Items in insertion order.
    torrents: Arc<RwLock<Vec<TorrentInfo>>>,
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    register_on_add: AtomicBool,
    hash_counter: AtomicUsize,
    list_calls: AtomicUsize,
    default_save_path: String,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self {
            added: Arc::new(RwLock::new(Vec::new())),
            torrents: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            register_on_add: AtomicBool::new(true),
            hash_counter: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            default_save_path: "/mock/downloads".to_string(),
        }
    }

    /// All recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<AddTorrentRequest> {
        self.added.read().await.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// When false, submissions succeed but never show up in listings.
    pub fn set_register_on_add(&self, register: bool) {
        self.register_on_add.store(register, Ordering::SeqCst);
    }

    /// Set the progress for a torrent (0.0 to 1.0). 1.0 marks it complete.
    pub async fn set_progress(&self, hash: &str, progress: f64) {
        let mut torrents = self.torrents.write().await;
        if let Some(torrent) = torrents.iter_mut().find(|t| t.hash == hash) {
            torrent.progress = progress.clamp(0.0, 1.0);
            torrent.completed_at = (torrent.progress >= 1.0).then(Utc::now);
        }
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.iter().any(|t| t.hash == hash)
    }

    pub async fn torrent_count(&self) -> usize {
        self.torrents.read().await.len()
    }

    /// Pre-populate an item, e.g. something the user added by hand.
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.torrents.write().await.push(info);
    }

    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }

    fn next_index(&self) -> usize {
        self.hash_counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Display name carried in a magnet's `dn` parameter.
fn magnet_display_name(uri: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("dn="))
        .and_then(|dn| urlencoding::decode(&dn.replace('+', " ")).ok().map(|s| s.into_owned()))
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<(), TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.added.write().await.push(request.clone());
        if !self.register_on_add.load(Ordering::SeqCst) {
            return Ok(());
        }

        let n = self.next_index();
        let hash = extract_hash_from_magnet(&request.urls)
            .unwrap_or_else(|| format!("mockhash{:08x}", n));
        let name = magnet_display_name(&request.urls)
            .unwrap_or_else(|| format!("Mock Torrent {}", n));

        let mut torrents = self.torrents.write().await;
        if torrents.iter().any(|t| t.hash == hash) {
            return Ok(());
        }
        torrents.push(TorrentInfo {
            hash,
            name,
            progress: 0.0,
            size_bytes: 100 * 1024 * 1024,
            seeders: 5,
            // Strictly increasing so "newest" is well defined
            added_at: Some(Utc::now() + Duration::milliseconds(n as i64)),
            completed_at: None,
            save_path: Some(self.default_save_path.clone()),
            category: request.category.clone(),
        });
        Ok(())
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let torrents = self.torrents.read().await;
        Ok(torrents
            .iter()
            .filter(|t| match filters.status {
                StatusFilter::All => true,
                StatusFilter::Completed => t.is_complete(),
                StatusFilter::Downloading => !t.is_complete(),
            })
            .filter(|t| {
                filters
                    .category
                    .as_ref()
                    .is_none_or(|c| t.category.as_ref() == Some(c))
            })
            .cloned()
            .collect())
    }
}
