//! Download monitor runner.
//!
//! Each tick runs three passes over the tracked set:
//! - **Completion**: completed client items flip their entry to `Completed`
//!   exactly once and emit a `Completed` event.
//! - **Stall**: entries whose progress stayed flat past the threshold get a
//!   replacement search (up to `max_retries` per lineage), then fail terminally.
//! - **Collection**: completed entries are dropped after the grace period.
//!
//! Errors inside a pass are logged and swallowed; the loop keeps going.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::torrent_client::{TorrentClient, TorrentFilters, TorrentInfo};

use super::{
    DownloadPhase, DownloadStore, EventHandle, Failover, MonitorConfig, MonitorError,
    MonitorEvent, MonitorStatus, TickReport, TrackedDownload,
};

/// Progress deltas smaller than this count as "no change".
const PROGRESS_EPSILON: f64 = 1e-6;

/// Supervises submitted downloads until they complete or fail.
pub struct DownloadMonitor {
    config: MonitorConfig,
    client: Arc<dyn TorrentClient>,
    failover: Failover,
    store: DownloadStore,
    events: EventHandle,
    running: Arc<AtomicBool>,
    ticking: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// Clears the single-flight flag when a tick ends, including on panic.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DownloadMonitor {
    pub fn new(
        config: MonitorConfig,
        client: Arc<dyn TorrentClient>,
        failover: Failover,
        store: DownloadStore,
        events: EventHandle,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            client,
            failover,
            store,
            events,
            running: Arc::new(AtomicBool::new(false)),
            ticking: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the polling loop. No-op when disabled or already running.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            info!("Download monitor disabled, not starting");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Download monitor already running");
            return;
        }

        let monitor = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                poll_interval_secs = monitor.config.poll_interval_secs,
                stall_threshold_secs = monitor.config.stall_threshold_secs,
                max_retries = monitor.config.max_retries,
                "Download monitor started"
            );
            let mut interval = tokio::time::interval(monitor.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Download monitor received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        if !monitor.running.load(Ordering::Relaxed) {
                            break;
                        }
                        let report = monitor.tick().await;
                        if report != TickReport::default() {
                            debug!(?report, "Monitor tick");
                        }
                    }
                }
            }
            info!("Download monitor stopped");
        });
    }

    /// Stop the polling loop. In-flight client calls finish on their own.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Start supervising a submitted download.
    pub async fn track(&self, download: TrackedDownload) -> Result<(), MonitorError> {
        let event = MonitorEvent::Tracked {
            owner: download.owner.clone(),
            hash: download.hash.clone(),
            name: download.name.clone(),
        };
        let hash = download.hash.clone();
        if !self.store.insert(download).await {
            warn!(hash = %hash, "Download already tracked");
            return Err(MonitorError::AlreadyTracked(hash));
        }
        info!(hash = %hash, "Tracking download");
        self.events.emit(event).await;
        Ok(())
    }

    pub async fn untrack(&self, hash: &str) -> Option<TrackedDownload> {
        self.store.remove(hash).await
    }

    pub async fn status(&self) -> MonitorStatus {
        let downloads = self.store.snapshot().await;
        MonitorStatus {
            running: self.is_running(),
            enabled: self.config.enabled,
            tracked: downloads.len(),
            downloads,
        }
    }

    /// Run one tick now.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick with an explicit clock. Returns a skipped report if a
    /// tick is already running.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        if self.ticking.swap(true, Ordering::SeqCst) {
            debug!("Previous tick still running, skipping");
            return TickReport::skipped();
        }
        let _guard = TickGuard(&self.ticking);

        let mut report = TickReport::default();
        if self.store.is_empty().await {
            return report;
        }

        if let Err(e) = self.completion_pass(now, &mut report).await {
            warn!("Completion check failed: {}", e);
        }
        if let Err(e) = self.stall_pass(now, &mut report).await {
            warn!("Stall check failed: {}", e);
        }
        self.collect(now, &mut report).await;
        report
    }

    async fn completion_pass(
        &self,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), MonitorError> {
        let completed = self
            .client
            .list_torrents(&TorrentFilters::completed())
            .await?;

        for item in completed {
            // Check-and-set under the store lock so the event fires once.
            let transitioned = self
                .store
                .update(&item.hash, |d| {
                    if d.notified {
                        None
                    } else {
                        d.mark_completed(now);
                        Some(d.clone())
                    }
                })
                .await
                .flatten();

            let Some(download) = transitioned else {
                continue;
            };

            info!(hash = %download.hash, name = %download.name, "Download completed");
            self.events
                .emit(MonitorEvent::Completed {
                    owner: download.owner.clone(),
                    hash: download.hash.clone(),
                    name: download.name.clone(),
                    size_bytes: item.size_bytes,
                    seeds: item.seeders,
                    elapsed_minutes: (now - download.started_at).num_minutes(),
                    save_path: item.save_path.clone(),
                })
                .await;
            report.completed.push(download.hash);
        }
        Ok(())
    }

    async fn stall_pass(
        &self,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), MonitorError> {
        let watched: Vec<TrackedDownload> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .filter(TrackedDownload::is_watchable)
            .collect();
        if watched.is_empty() {
            return Ok(());
        }

        let active = self
            .client
            .list_torrents(&TorrentFilters::downloading())
            .await?;
        let by_hash: HashMap<String, &TorrentInfo> = active
            .iter()
            .map(|t| (t.hash.to_lowercase(), t))
            .collect();

        for download in watched {
            let Some(item) = by_hash.get(&download.hash) else {
                continue;
            };

            if (item.progress - download.last_progress).abs() > PROGRESS_EPSILON {
                let progress = item.progress;
                self.store
                    .update(&download.hash, |d| {
                        d.last_progress = progress;
                        d.last_progress_check = now;
                    })
                    .await;
                report.progressed += 1;
                continue;
            }

            if now - download.last_progress_check <= self.config.stall_threshold() {
                continue;
            }

            // Without a stored query there is nothing to search for.
            if download.search_query.is_some() && download.retry_count < self.config.max_retries {
                self.attempt_replacement(download, now, report).await;
            } else {
                self.fail(download, report).await;
            }
        }
        Ok(())
    }

    async fn attempt_replacement(
        &self,
        download: TrackedDownload,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        let Some(download) = self
            .store
            .update(&download.hash, |d| {
                d.stall_detected = true;
                d.retry_count += 1;
                d.phase = DownloadPhase::Stalled;
                d.clone()
            })
            .await
        else {
            return;
        };

        warn!(
            hash = %download.hash,
            name = %download.name,
            retry = download.retry_count,
            max_retries = self.config.max_retries,
            "Download stalled, looking for a replacement"
        );
        report.stalled.push(download.hash.clone());
        self.events
            .emit(MonitorEvent::StallRetryAttempted {
                owner: download.owner.clone(),
                hash: download.hash.clone(),
                name: download.name.clone(),
                retry_count: download.retry_count,
                max_retries: self.config.max_retries,
            })
            .await;

        self.store
            .update(&download.hash, |d| d.phase = DownloadPhase::Retrying)
            .await;

        match self.replace(&download, now).await {
            Ok(Some(replacement)) => {
                info!(
                    old_hash = %download.hash,
                    new_hash = %replacement.hash,
                    "Replacement submitted"
                );
                report
                    .replaced
                    .push((download.hash.clone(), replacement.hash.clone()));
                self.events
                    .emit(MonitorEvent::RetrySucceeded {
                        owner: download.owner.clone(),
                        old_hash: download.hash.clone(),
                        old_name: download.name.clone(),
                        new_hash: replacement.hash,
                        new_name: replacement.name,
                    })
                    .await;
            }
            Ok(None) => {
                self.store.update(&download.hash, |d| d.release(now)).await;
            }
            Err(e) => {
                warn!(hash = %download.hash, "Replacement attempt failed: {}", e);
                self.store.update(&download.hash, |d| d.release(now)).await;
            }
        }
    }

    /// Search, submit and swap the tracked entry. `Ok(None)` means nothing usable.
    async fn replace(
        &self,
        download: &TrackedDownload,
        now: DateTime<Utc>,
    ) -> Result<Option<TrackedDownload>, MonitorError> {
        let Some(candidate) = self.failover.find_replacement(download).await? else {
            return Ok(None);
        };
        let Some(locator) = candidate.locator() else {
            return Ok(None);
        };

        let outcome = self.failover.submitter().submit(locator).await?;
        let Some(new_hash) = outcome.hash.map(|h| h.to_lowercase()) else {
            warn!(
                hash = %download.hash,
                "Replacement submitted but could not be identified"
            );
            return Ok(None);
        };
        if new_hash == download.hash {
            return Ok(None);
        }

        let replacement = TrackedDownload::new(
            new_hash,
            outcome.name.unwrap_or_else(|| candidate.title.clone()),
            download.owner.clone(),
            now,
        )
        .with_query(download.search_query.clone())
        .with_locator(locator)
        .with_retry_count(download.retry_count);

        // A hash tracked by another lineage is not ours to take over.
        if !self.store.insert(replacement.clone()).await {
            warn!(
                hash = %download.hash,
                replacement = %replacement.hash,
                "Replacement resolved to an already tracked download"
            );
            return Ok(None);
        }
        self.store.remove(&download.hash).await;
        Ok(Some(replacement))
    }

    async fn fail(&self, download: TrackedDownload, report: &mut TickReport) {
        let marked = self
            .store
            .update(&download.hash, |d| {
                if d.notified {
                    false
                } else {
                    d.mark_failed();
                    true
                }
            })
            .await
            .unwrap_or(false);
        if !marked {
            return;
        }

        warn!(
            hash = %download.hash,
            name = %download.name,
            retries = download.retry_count,
            "Download failed after exhausting retries"
        );
        self.events
            .emit(MonitorEvent::Failed {
                owner: download.owner.clone(),
                hash: download.hash.clone(),
                name: download.name.clone(),
                retry_count: download.retry_count,
            })
            .await;
        self.store.remove(&download.hash).await;
        report.failed.push(download.hash);
    }

    async fn collect(&self, now: DateTime<Utc>, report: &mut TickReport) {
        let grace = self.config.completion_grace();
        for download in self.store.snapshot().await {
            let expired = download
                .completed_at
                .is_some_and(|done| now - done >= grace);
            if expired {
                self.store.remove(&download.hash).await;
                report.collected += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{event_channel, EventEnvelope};
    use crate::searcher::{SearchEngine, SearchPreferences};
    use crate::submitter::{Submitter, SubmitterConfig};
    use crate::testing::{fixtures, MockSearcher, MockTorrentClient};
    use chrono::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        monitor: Arc<DownloadMonitor>,
        client: Arc<MockTorrentClient>,
        searcher: Arc<MockSearcher>,
        events: mpsc::Receiver<EventEnvelope>,
    }

    fn harness(config: MonitorConfig) -> Harness {
        let client = Arc::new(MockTorrentClient::new());
        let searcher = Arc::new(MockSearcher::new());
        let submitter = Submitter::new(
            client.clone(),
            &SubmitterConfig { settle_delay_ms: 0 },
            Some("audiobooks".to_string()),
        );
        let failover = Failover::new(
            Arc::new(SearchEngine::new(searcher.clone())),
            Arc::new(submitter),
            SearchPreferences::default(),
        );
        let (handle, events) = event_channel(64);
        let monitor = Arc::new(DownloadMonitor::new(
            config,
            client.clone(),
            failover,
            DownloadStore::new(),
            handle,
        ));
        Harness {
            monitor,
            client,
            searcher,
            events,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<EventEnvelope>) -> Vec<MonitorEvent> {
        let mut out = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            out.push(envelope.event);
        }
        out
    }

    #[tokio::test]
    async fn test_track_rejects_duplicate_hash() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now))
            .await
            .unwrap();
        let err = h
            .monitor
            .track(TrackedDownload::new("ABC", "Dune", "o", now))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::AlreadyTracked(_)));
        assert_eq!(drain(&mut h.events).len(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_makes_no_client_calls() {
        let h = harness(MonitorConfig::default());
        let report = h.monitor.tick().await;
        assert_eq!(report, TickReport::default());
        assert_eq!(h.client.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_completion_fires_once() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.4))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "chat-1", now))
            .await
            .unwrap();
        drain(&mut h.events);

        h.client.set_progress("abc", 1.0).await;
        let first = h.monitor.tick_at(now + Duration::minutes(3)).await;
        let second = h.monitor.tick_at(now + Duration::minutes(4)).await;

        assert_eq!(first.completed, vec!["abc".to_string()]);
        assert!(second.completed.is_empty());

        let events = drain(&mut h.events);
        assert_eq!(events.len(), 1);
        match &events[0] {
            MonitorEvent::Completed {
                owner,
                elapsed_minutes,
                save_path,
                ..
            } => {
                assert_eq!(owner, "chat-1");
                assert_eq!(*elapsed_minutes, 3);
                assert_eq!(save_path.as_deref(), Some("/downloads"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        let entry = h.monitor.store().get("abc").await.unwrap();
        assert_eq!(entry.phase, DownloadPhase::Completed);
    }

    #[tokio::test]
    async fn test_progress_resets_stall_clock() {
        let h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.1))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now))
            .await
            .unwrap();

        let t1 = now + Duration::minutes(9);
        let report = h.monitor.tick_at(t1).await;
        assert_eq!(report.progressed, 1);

        // 9 minutes after the last change: not yet stalled
        let report = h.monitor.tick_at(t1 + Duration::minutes(9)).await;
        assert!(report.stalled.is_empty());
        let entry = h.monitor.store().get("abc").await.unwrap();
        assert_eq!(entry.last_progress_check, t1);
        assert!((entry.last_progress - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stall_without_query_fails() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.0))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now))
            .await
            .unwrap();
        drain(&mut h.events);

        let report = h.monitor.tick_at(now + Duration::minutes(11)).await;
        assert!(report.stalled.is_empty());
        assert_eq!(report.failed, vec!["abc".to_string()]);
        assert_eq!(h.searcher.search_count().await, 0);
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [MonitorEvent::Failed { retry_count: 0, .. }]
        ));
    }

    #[tokio::test]
    async fn test_stall_without_replacement_releases_entry() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.0))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now).with_query(Some("dune".into())))
            .await
            .unwrap();
        drain(&mut h.events);

        let later = now + Duration::minutes(11);
        let report = h.monitor.tick_at(later).await;
        assert_eq!(report.stalled, vec!["abc".to_string()]);
        assert!(report.replaced.is_empty());
        assert_eq!(h.searcher.search_count().await, 1);

        let entry = h.monitor.store().get("abc").await.unwrap();
        assert_eq!(entry.retry_count, 1);
        assert!(!entry.stall_detected);
        assert_eq!(entry.phase, DownloadPhase::Tracking);
        assert_eq!(entry.last_progress_check, later);

        let events = drain(&mut h.events);
        assert!(matches!(
            events.as_slice(),
            [MonitorEvent::StallRetryAttempted { retry_count: 1, max_retries: 2, .. }]
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let mut h = harness(MonitorConfig {
            max_retries: 0,
            ..MonitorConfig::default()
        });
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.0))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now).with_query(Some("dune".into())))
            .await
            .unwrap();
        drain(&mut h.events);

        let report = h.monitor.tick_at(now + Duration::minutes(11)).await;
        assert_eq!(report.failed, vec!["abc".to_string()]);
        assert!(h.monitor.store().is_empty().await);
        assert_eq!(h.searcher.search_count().await, 0);
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [MonitorEvent::Failed { retry_count: 0, .. }]
        ));
    }

    #[tokio::test]
    async fn test_client_error_is_swallowed() {
        let h = harness(MonitorConfig::default());
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", Utc::now()))
            .await
            .unwrap();
        h.client
            .set_next_error(crate::torrent_client::TorrentClientError::Timeout)
            .await;

        let report = h.monitor.tick().await;
        assert!(!report.skipped);
        assert!(h.monitor.store().contains("abc").await);
    }

    #[tokio::test]
    async fn test_completed_entries_are_collected_after_grace() {
        let h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 1.0))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now))
            .await
            .unwrap();

        h.monitor.tick_at(now).await;
        assert!(h.monitor.store().contains("abc").await);

        let report = h.monitor.tick_at(now + Duration::minutes(6)).await;
        assert_eq!(report.collected, 1);
        assert!(h.monitor.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness(MonitorConfig {
            poll_interval_secs: 3600,
            ..MonitorConfig::default()
        });
        h.monitor.start();
        assert!(h.monitor.is_running());
        h.monitor.stop();
        assert!(!h.monitor.is_running());
    }

    #[tokio::test]
    async fn test_disabled_monitor_does_not_start() {
        let h = harness(MonitorConfig {
            enabled: false,
            ..MonitorConfig::default()
        });
        h.monitor.start();
        assert!(!h.monitor.is_running());
        assert!(!h.monitor.status().await.enabled);
    }

    #[tokio::test]
    async fn test_search_error_during_replacement_releases_entry() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        h.client
            .add_mock_torrent(fixtures::torrent_info("abc", "Dune", 0.0))
            .await;
        h.monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now).with_query(Some("dune".into())))
            .await
            .unwrap();
        drain(&mut h.events);
        h.searcher
            .set_next_error(crate::searcher::SearchError::Network("connection reset".into()))
            .await;

        let later = now + Duration::minutes(11);
        let report = h.monitor.tick_at(later).await;
        assert_eq!(report.stalled, vec!["abc".to_string()]);
        assert!(report.replaced.is_empty());
        assert!(report.failed.is_empty());

        let entry = h.monitor.store().get("abc").await.unwrap();
        assert_eq!(entry.retry_count, 1);
        assert!(!entry.stall_detected);
        assert_eq!(entry.phase, DownloadPhase::Tracking);
        assert_eq!(entry.last_progress_check, later);
        assert!(matches!(
            drain(&mut h.events).as_slice(),
            [MonitorEvent::StallRetryAttempted { retry_count: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn test_replacement_resolving_to_another_owners_download_is_rejected() {
        let mut h = harness(MonitorConfig::default());
        let now = Utc::now();
        let later = now + Duration::minutes(11);

        h.client
            .add_mock_torrent(fixtures::torrent_info("aaaa", "Dune Part One", 0.0))
            .await;
        let mut bobs = fixtures::torrent_info("bbbb", "Dune Messiah", 0.5);
        bobs.added_at = Some(Utc::now() + Duration::minutes(1));
        h.client.add_mock_torrent(bobs).await;
        // The replacement is accepted but never listed, so the newest item wins
        h.client.set_register_on_add(false);

        h.monitor
            .track(
                TrackedDownload::new("aaaa", "Dune Part One", "alice", now)
                    .with_query(Some("dune".into())),
            )
            .await
            .unwrap();
        let mut bob = TrackedDownload::new("bbbb", "Dune Messiah", "bob", later);
        bob.last_progress = 0.5;
        h.monitor.track(bob).await.unwrap();
        drain(&mut h.events);

        let mut candidate = fixtures::candidate("Dune - Frank Herbert [M4B]", 50);
        candidate.magnet_uri = None;
        h.searcher.set_results(vec![candidate]).await;

        let report = h.monitor.tick_at(later).await;
        assert_eq!(report.stalled, vec!["aaaa".to_string()]);
        assert!(report.replaced.is_empty());
        assert_eq!(h.client.added_torrents().await.len(), 1);

        let alice = h.monitor.store().get("aaaa").await.unwrap();
        assert_eq!(alice.owner, "alice");
        assert_eq!(alice.retry_count, 1);
        assert_eq!(alice.phase, DownloadPhase::Tracking);
        assert_eq!(h.monitor.store().get("bbbb").await.unwrap().owner, "bob");

        let events = drain(&mut h.events);
        assert!(matches!(
            events.as_slice(),
            [MonitorEvent::StallRetryAttempted { owner, .. }] if owner == "alice"
        ));
    }

    /// Client whose listings block until released.
    struct GatedClient {
        entered: tokio::sync::Notify,
        release: tokio::sync::Semaphore,
    }

    #[async_trait::async_trait]
    impl TorrentClient for GatedClient {
        fn name(&self) -> &str {
            "gated"
        }

        async fn add_torrent(
            &self,
            _request: crate::torrent_client::AddTorrentRequest,
        ) -> Result<(), crate::torrent_client::TorrentClientError> {
            Ok(())
        }

        async fn list_torrents(
            &self,
            _filters: &TorrentFilters,
        ) -> Result<Vec<TorrentInfo>, crate::torrent_client::TorrentClientError> {
            self.entered.notify_one();
            let _permit = self.release.acquire().await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let client = Arc::new(GatedClient {
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Semaphore::new(0),
        });
        let submitter = Submitter::new(
            client.clone(),
            &SubmitterConfig { settle_delay_ms: 0 },
            None,
        );
        let failover = Failover::new(
            Arc::new(SearchEngine::new(Arc::new(MockSearcher::new()))),
            Arc::new(submitter),
            SearchPreferences::default(),
        );
        let (handle, _events) = event_channel(8);
        let monitor = Arc::new(DownloadMonitor::new(
            MonitorConfig::default(),
            client.clone(),
            failover,
            DownloadStore::new(),
            handle,
        ));
        let now = Utc::now();
        monitor
            .track(TrackedDownload::new("abc", "Dune", "o", now))
            .await
            .unwrap();

        let first = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.tick_at(now).await }
        });
        client.entered.notified().await;

        let overlapping = monitor.tick_at(now).await;
        assert!(overlapping.skipped);

        client.release.add_permits(1);
        let first = first.await.unwrap();
        assert!(!first.skipped);

        // The guard is released once the first tick finishes
        assert!(!monitor.tick_at(now).await.skipped);
    }
}
