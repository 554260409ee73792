//! Shared store of tracked downloads, keyed by lowercase hash.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::TrackedDownload;

/// Hash → tracked download. Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct DownloadStore {
    inner: Arc<RwLock<HashMap<String, TrackedDownload>>>,
}

impl DownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. Returns false (and keeps the existing one) if the hash is live.
    pub async fn insert(&self, download: TrackedDownload) -> bool {
        let key = download.hash.to_lowercase();
        let mut map = self.inner.write().await;
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, download);
        true
    }

    pub async fn get(&self, hash: &str) -> Option<TrackedDownload> {
        self.inner.read().await.get(&hash.to_lowercase()).cloned()
    }

    pub async fn contains(&self, hash: &str) -> bool {
        self.inner.read().await.contains_key(&hash.to_lowercase())
    }

    pub async fn remove(&self, hash: &str) -> Option<TrackedDownload> {
        self.inner.write().await.remove(&hash.to_lowercase())
    }

    /// Mutate an entry in place under the write lock.
    pub async fn update<F, R>(&self, hash: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut TrackedDownload) -> R,
    {
        self.inner
            .write()
            .await
            .get_mut(&hash.to_lowercase())
            .map(f)
    }

    /// All entries, oldest first.
    pub async fn snapshot(&self) -> Vec<TrackedDownload> {
        let mut all: Vec<TrackedDownload> = self.inner.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.hash.cmp(&b.hash)));
        all
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
