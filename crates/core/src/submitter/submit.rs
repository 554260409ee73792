//! Submission to the download client and recovery of the new item's hash.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::torrent_client::{
    extract_hash_from_magnet, AddTorrentRequest, TorrentClient, TorrentFilters, TorrentInfo,
};

use super::{SubmitError, SubmitOutcome, SubmitterConfig};

/// Sends locators to the download client.
///
/// The client does not report the hash of what it created, so after a
/// settle delay the submitter lists the category and picks the item: the
/// magnet's `btih` when present, otherwise the most recently added one that
/// appeared no earlier than the submission.
pub struct Submitter {
    client: Arc<dyn TorrentClient>,
    category: Option<String>,
    settle_delay: Duration,
}

impl Submitter {
    pub fn new(
        client: Arc<dyn TorrentClient>,
        config: &SubmitterConfig,
        category: Option<String>,
    ) -> Self {
        Self {
            client,
            category,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }

    pub fn client(&self) -> &Arc<dyn TorrentClient> {
        &self.client
    }

    pub async fn submit(&self, locator: &str) -> Result<SubmitOutcome, SubmitError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(SubmitError::InvalidLocator("empty locator".to_string()));
        }

        let mut request = AddTorrentRequest::url(locator);
        if let Some(category) = &self.category {
            request = request.with_category(category.clone());
        }
        // The client reports add times in whole seconds.
        let submitted_at = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap_or_default();
        self.client.add_torrent(request).await?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let filters = TorrentFilters::all().in_category(self.category.clone());
        let items = match self.client.list_torrents(&filters).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Submitted, but could not list download client items");
                return Ok(SubmitOutcome::unidentified());
            }
        };

        match identify(locator, self.category.as_deref(), submitted_at, &items) {
            Some(item) => {
                info!(hash = %item.hash, name = %item.name, "Submitted download");
                Ok(SubmitOutcome::identified(&item.hash, &item.name))
            }
            None => {
                debug!(items = items.len(), "Submitted, but the new item could not be identified");
                Ok(SubmitOutcome::unidentified())
            }
        }
    }
}

/// Pick the item a submission created.
fn identify<'a>(
    locator: &str,
    category: Option<&str>,
    submitted_at: DateTime<Utc>,
    items: &'a [TorrentInfo],
) -> Option<&'a TorrentInfo> {
    if let Some(btih) = extract_hash_from_magnet(locator) {
        if let Some(item) = items.iter().find(|t| t.hash.eq_ignore_ascii_case(&btih)) {
            return Some(item);
        }
    }

    items
        .iter()
        .filter(|t| category.is_none_or(|c| t.category.as_deref() == Some(c)))
        .filter(|t| t.added_at.is_some_and(|added| added >= submitted_at))
        .max_by_key(|t| t.added_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockTorrentClient};
    use crate::torrent_client::TorrentClientError;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn submitter(client: Arc<MockTorrentClient>) -> Submitter {
        Submitter::new(
            client,
            &SubmitterConfig { settle_delay_ms: 0 },
            Some("audiobooks".to_string()),
        )
    }

    fn added(hash: &str, category: &str, secs: i64) -> TorrentInfo {
        let mut info = fixtures::torrent_info(hash, hash, 0.0);
        info.category = Some(category.to_string());
        info.added_at = Utc.timestamp_opt(1_700_000_000 + secs, 0).single();
        info
    }

    #[tokio::test]
    async fn test_submit_magnet_identifies_by_btih() {
        let client = Arc::new(MockTorrentClient::new());
        // Someone else's newer item in the same category
        client.add_mock_torrent(added("zzz", "audiobooks", 999_999_999)).await;

        let outcome = submitter(client.clone())
            .submit(&fixtures::magnet("abc123", "Dune [M4B]"))
            .await
            .unwrap();

        assert_eq!(outcome.hash.as_deref(), Some("abc123"));
        assert_eq!(outcome.name.as_deref(), Some("Dune [M4B]"));

        let requests = client.added_torrents().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].category.as_deref(), Some("audiobooks"));
    }

    #[tokio::test]
    async fn test_submit_url_picks_newest_in_category() {
        let client = Arc::new(MockTorrentClient::new());
        client.add_mock_torrent(added("old", "audiobooks", 0)).await;
        client.add_mock_torrent(added("elsewhere", "movies", 999_999_999)).await;

        let outcome = submitter(client.clone())
            .submit("http://indexer.local/dl/1.torrent")
            .await
            .unwrap();

        // The mock registers the new item with a current timestamp
        assert_eq!(outcome.hash.as_deref(), Some("mockhash00000001"));
    }

    #[tokio::test]
    async fn test_submit_url_ignores_items_added_before_submission() {
        let client = Arc::new(MockTorrentClient::new());
        client.set_register_on_add(false);
        let mut earlier = fixtures::torrent_info("bbbb", "Someone else's book", 0.3);
        earlier.category = Some("audiobooks".to_string());
        earlier.added_at = Some(Utc::now() - ChronoDuration::minutes(5));
        client.add_mock_torrent(earlier).await;

        let outcome = submitter(client.clone())
            .submit("http://indexer.local/dl/7.torrent")
            .await
            .unwrap();

        assert!(!outcome.is_identified());
    }

    #[tokio::test]
    async fn test_submit_unidentified_is_still_success() {
        let client = Arc::new(MockTorrentClient::new());
        client.set_register_on_add(false);

        let outcome = submitter(client.clone())
            .submit("http://indexer.local/dl/1.torrent")
            .await
            .unwrap();

        assert!(!outcome.is_identified());
        assert!(outcome.name.is_none());
        assert_eq!(client.added_torrents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_empty_locator() {
        let client = Arc::new(MockTorrentClient::new());
        let err = submitter(client.clone()).submit("  ").await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidLocator(_)));
        assert!(client.added_torrents().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_auth_failure_is_fatal() {
        let client = Arc::new(MockTorrentClient::new());
        client
            .set_next_error(TorrentClientError::AuthenticationFailed("bad".into()))
            .await;

        let err = submitter(client.clone())
            .submit(&fixtures::magnet("abc", "Dune"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Authentication(_)));
        assert_eq!(client.list_calls(), 0);
    }

    #[test]
    fn test_identify_without_timestamps() {
        let items = vec![fixtures::torrent_info("a", "A", 0.0)];
        let since = Utc::now();
        assert!(identify("http://x/1.torrent", Some("audiobooks"), since, &items).is_none());
        assert_eq!(
            identify("magnet:?xt=urn:btih:A", None, since, &items).map(|t| t.hash.as_str()),
            Some("a")
        );
    }
}
