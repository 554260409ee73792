//! Acquisition service: text in, tracked download out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::interpreter::{parse, AcquisitionRequest, Intent, ParsedInput};
use crate::monitor::{DownloadMonitor, MonitorError, TrackedDownload};
use crate::searcher::{
    compose_query, Candidate, FormatTier, SearchEngine, SearchOptions, SearchPreferences,
};
use crate::submitter::{SubmitError, Submitter};

use super::types::PendingChoice;
use super::{AcquisitionError, AcquisitionOutcome, AcquisitionReply};

/// How many candidates an owner can choose from.
const MAX_OPTIONS: usize = 5;

/// Owners with a remembered list; the oldest list is dropped beyond this.
const MAX_PENDING_OWNERS: usize = 256;

const HELP_TEXT: &str = "Tell me what to fetch, e.g. \"find Project Hail Mary by Andy Weir\". \
Ask \"more books by <author>\" for a list, reply with a number to pick from it, \
or ask \"status\" to see what is downloading.";

const UNKNOWN_TEXT: &str =
    "I couldn't tell what you're looking for. Try \"find <title> by <author>\", or ask for help.";

/// Runs the interpret → search → select → submit → track flow.
pub struct AcquisitionService {
    engine: Arc<SearchEngine>,
    submitter: Arc<Submitter>,
    monitor: Arc<DownloadMonitor>,
    preferences: SearchPreferences,
    pending: RwLock<HashMap<String, PendingChoice>>,
    pending_seq: AtomicU64,
}

impl AcquisitionService {
    pub fn new(
        engine: Arc<SearchEngine>,
        submitter: Arc<Submitter>,
        monitor: Arc<DownloadMonitor>,
        preferences: SearchPreferences,
    ) -> Self {
        Self {
            engine,
            submitter,
            monitor,
            preferences,
            pending: RwLock::new(HashMap::new()),
            pending_seq: AtomicU64::new(0),
        }
    }

    pub fn monitor(&self) -> &Arc<DownloadMonitor> {
        &self.monitor
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    /// Interpret without side effects.
    pub fn interpret(&self, text: &str) -> ParsedInput {
        parse(text)
    }

    /// Handle one message from `owner`. Never fails; errors become a message.
    pub async fn handle_text(&self, text: &str, owner: &str) -> AcquisitionReply {
        let parsed = parse(text);
        let extracted = parsed.extracted.clone();

        let result = match (parsed.intent, extracted.as_ref()) {
            (Intent::Help, _) => return reply(parsed, None, HELP_TEXT.to_string()),
            (Intent::Status, _) => {
                let message = self.status_message(owner).await;
                return reply(parsed, None, message);
            }
            (Intent::Select(n), _) => self.select(n, owner).await,
            (Intent::MoreByAuthor, Some(request)) => self.list_options(request, owner).await,
            (Intent::Search, Some(request)) => self.acquire(request, owner).await,
            _ => return reply(parsed, None, UNKNOWN_TEXT.to_string()),
        };

        match result {
            Ok(outcome) => {
                let message = describe_outcome(&outcome, extracted.as_ref());
                reply(parsed, Some(outcome), message)
            }
            Err(e) => {
                warn!(owner = owner, "Acquisition failed: {}", e);
                let message = e.user_message();
                reply(parsed, None, message)
            }
        }
    }

    /// Search for a request, submit the best candidate and start tracking it.
    pub async fn acquire(
        &self,
        request: &AcquisitionRequest,
        owner: &str,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let options = SearchOptions::from_preferences(&self.preferences);
        let query = compose_query(request, &options.fields);
        if query.is_empty() {
            return Ok(AcquisitionOutcome::NoResults { total: 0 });
        }

        let result = self.engine.search(&query, &options).await?;
        let Some(best) = result.candidates.iter().find(|c| c.locator().is_some()).cloned() else {
            info!(query = %query, total = result.total, "No usable results");
            return Ok(AcquisitionOutcome::NoResults {
                total: result.total,
            });
        };

        self.remember(owner, &query, result.format, &result.candidates)
            .await;
        self.submit_candidate(&best, &query, result.format, owner)
            .await
    }

    /// Search and return a short list for the owner to pick from.
    pub async fn list_options(
        &self,
        request: &AcquisitionRequest,
        owner: &str,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let options = SearchOptions::from_preferences(&self.preferences);
        let query = compose_query(request, &options.fields);
        if query.is_empty() {
            return Ok(AcquisitionOutcome::NoResults { total: 0 });
        }

        let result = self.engine.search(&query, &options).await?;
        let usable: Vec<Candidate> = result
            .candidates
            .into_iter()
            .filter(|c| c.locator().is_some())
            .take(MAX_OPTIONS)
            .collect();
        if usable.is_empty() {
            return Ok(AcquisitionOutcome::NoResults {
                total: result.total,
            });
        }

        self.remember(owner, &query, result.format, &usable).await;
        Ok(AcquisitionOutcome::Options { candidates: usable })
    }

    /// Submit entry `n` (1-based) of the list last shown to `owner`.
    pub async fn select(&self, n: u32, owner: &str) -> Result<AcquisitionOutcome, AcquisitionError> {
        let pending = self
            .pending
            .read()
            .await
            .get(owner)
            .cloned()
            .ok_or(AcquisitionError::NothingToSelect)?;

        let available = pending.candidates.len();
        let candidate = (n as usize)
            .checked_sub(1)
            .and_then(|i| pending.candidates.get(i))
            .ok_or(AcquisitionError::InvalidSelection {
                selected: n,
                available,
            })?;

        let outcome = self
            .submit_candidate(candidate, &pending.query, pending.format, owner)
            .await?;
        self.pending.write().await.remove(owner);
        Ok(outcome)
    }

    async fn remember(&self, owner: &str, query: &str, format: FormatTier, candidates: &[Candidate]) {
        let choice = PendingChoice {
            query: query.to_string(),
            format,
            candidates: candidates.iter().take(MAX_OPTIONS).cloned().collect(),
            seq: self.pending_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut pending = self.pending.write().await;
        if !pending.contains_key(owner) && pending.len() >= MAX_PENDING_OWNERS {
            let stalest = pending
                .iter()
                .min_by_key(|(_, c)| c.seq)
                .map(|(o, _)| o.clone());
            if let Some(stalest) = stalest {
                pending.remove(&stalest);
            }
        }
        pending.insert(owner.to_string(), choice);
    }

    async fn submit_candidate(
        &self,
        candidate: &Candidate,
        query: &str,
        format: FormatTier,
        owner: &str,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let locator = candidate
            .locator()
            .ok_or_else(|| SubmitError::InvalidLocator(candidate.title.clone()))?;

        let outcome = self.submitter.submit(locator).await?;
        let Some(hash) = outcome.hash else {
            return Ok(AcquisitionOutcome::SubmittedUntracked {
                title: candidate.title.clone(),
            });
        };
        let name = outcome.name.unwrap_or_else(|| candidate.title.clone());

        let download = TrackedDownload::new(&hash, &name, owner, Utc::now())
            .with_query(Some(query.to_string()))
            .with_locator(locator);
        let hash = download.hash.clone();

        match self.monitor.track(download).await {
            Ok(()) => Ok(AcquisitionOutcome::Tracking {
                hash,
                name,
                title: candidate.title.clone(),
                format,
                seeders: candidate.seeders,
            }),
            Err(MonitorError::AlreadyTracked(hash)) => {
                Ok(AcquisitionOutcome::AlreadyTracking { hash, name })
            }
            Err(e) => {
                warn!(hash = %hash, "Could not track submitted download: {}", e);
                Ok(AcquisitionOutcome::SubmittedUntracked {
                    title: candidate.title.clone(),
                })
            }
        }
    }

    async fn status_message(&self, owner: &str) -> String {
        let status = self.monitor.status().await;
        let mine: Vec<String> = status
            .downloads
            .iter()
            .filter(|d| d.owner == owner)
            .map(|d| {
                format!(
                    "- {}: {} ({:.0}%)",
                    d.name,
                    phase_label(d.phase),
                    d.last_progress * 100.0
                )
            })
            .collect();

        if mine.is_empty() {
            "Nothing of yours is downloading right now.".to_string()
        } else {
            format!("Your downloads:\n{}", mine.join("\n"))
        }
    }
}

fn phase_label(phase: crate::monitor::DownloadPhase) -> &'static str {
    use crate::monitor::DownloadPhase;
    match phase {
        DownloadPhase::Tracking => "downloading",
        DownloadPhase::Stalled => "stalled",
        DownloadPhase::Retrying => "looking for another release",
        DownloadPhase::Completed => "done",
        DownloadPhase::Failed => "failed",
    }
}

fn reply(parsed: ParsedInput, outcome: Option<AcquisitionOutcome>, message: String) -> AcquisitionReply {
    AcquisitionReply {
        parsed,
        outcome,
        message,
    }
}

fn describe_outcome(outcome: &AcquisitionOutcome, request: Option<&AcquisitionRequest>) -> String {
    match outcome {
        AcquisitionOutcome::Tracking {
            name,
            format,
            seeders,
            ..
        } => format!(
            "Found {} ({}, {} seeders). Downloading now, I'll tell you when it's done.",
            name,
            format.as_str(),
            seeders
        ),
        AcquisitionOutcome::AlreadyTracking { name, .. } => {
            format!("{} is already downloading.", name)
        }
        AcquisitionOutcome::SubmittedUntracked { title } => format!(
            "Sent {} to the download client, but I can't follow its progress.",
            title
        ),
        AcquisitionOutcome::Options { candidates } => {
            let lines: Vec<String> = candidates
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {} ({} seeders)", i + 1, c.title, c.seeders))
                .collect();
            format!(
                "Here's what I found:\n{}\nReply with a number to pick one.",
                lines.join("\n")
            )
        }
        AcquisitionOutcome::NoResults { .. } => format!(
            "Sorry, I couldn't find anything for {}.",
            request.map_or_else(|| "that".to_string(), AcquisitionRequest::describe)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{event_channel, DownloadStore, EventEnvelope, Failover, MonitorConfig, MonitorEvent};
    use crate::searcher::SearchError;
    use crate::submitter::SubmitterConfig;
    use crate::testing::{fixtures, MockSearcher, MockTorrentClient};
    use tokio::sync::mpsc;

    struct Harness {
        service: AcquisitionService,
        searcher: Arc<MockSearcher>,
        client: Arc<MockTorrentClient>,
        events: mpsc::Receiver<EventEnvelope>,
    }

    fn harness() -> Harness {
        let searcher = Arc::new(MockSearcher::new());
        let client = Arc::new(MockTorrentClient::new());
        let engine = Arc::new(SearchEngine::new(searcher.clone()));
        let submitter = Arc::new(Submitter::new(
            client.clone(),
            &SubmitterConfig { settle_delay_ms: 0 },
            Some("audiobooks".to_string()),
        ));
        let (handle, events) = event_channel(32);
        let monitor = Arc::new(DownloadMonitor::new(
            MonitorConfig::default(),
            client.clone(),
            Failover::new(engine.clone(), submitter.clone(), SearchPreferences::default()),
            DownloadStore::new(),
            handle,
        ));
        Harness {
            service: AcquisitionService::new(engine, submitter, monitor, SearchPreferences::default()),
            searcher,
            client,
            events,
        }
    }

    #[tokio::test]
    async fn test_search_submits_best_and_tracks() {
        let mut h = harness();
        h.searcher
            .set_results(vec![
                fixtures::candidate("Dune - Frank Herbert [MP3]", 40),
                fixtures::candidate("Dune - Frank Herbert [M4B]", 12),
            ])
            .await;

        let reply = h.service.handle_text("find dune by frank herbert", "chat-7").await;
        assert_eq!(reply.parsed.intent, Intent::Search);

        let expected_hash = fixtures::hash_for("Dune - Frank Herbert [M4B]");
        match reply.outcome {
            Some(AcquisitionOutcome::Tracking {
                ref hash,
                format,
                seeders,
                ..
            }) => {
                assert_eq!(hash, &expected_hash);
                assert_eq!(format, FormatTier::M4b);
                assert_eq!(seeders, 12);
            }
            ref other => panic!("unexpected outcome {:?}", other),
        }
        assert!(reply.message.contains("Downloading now"));

        let tracked = h.service.monitor().store().get(&expected_hash).await.unwrap();
        assert_eq!(tracked.owner, "chat-7");
        assert!(tracked.search_query.is_some());
        assert_eq!(h.client.added_torrents().await.len(), 1);

        let event = h.events.recv().await.unwrap().event;
        assert!(matches!(event, MonitorEvent::Tracked { .. }));
    }

    #[tokio::test]
    async fn test_no_results_message() {
        let h = harness();
        let reply = h.service.handle_text("find dune", "o").await;
        assert!(matches!(
            reply.outcome,
            Some(AcquisitionOutcome::NoResults { total: 0 })
        ));
        assert!(reply.message.starts_with("Sorry, I couldn't find anything"));
        assert!(h.client.added_torrents().await.is_empty());
    }

    #[tokio::test]
    async fn test_search_error_becomes_user_message() {
        let h = harness();
        h.searcher
            .set_next_error(SearchError::Authentication("bad key".into()))
            .await;

        let reply = h.service.handle_text("find dune", "o").await;
        assert!(reply.outcome.is_none());
        assert!(!reply.message.contains("bad key"));
        assert!(reply.message.starts_with("Sorry"));
    }

    #[tokio::test]
    async fn test_author_list_then_select() {
        let h = harness();
        h.searcher
            .set_results(vec![
                fixtures::candidate("Andy Weir - The Martian [M4B]", 30),
                fixtures::candidate("Andy Weir - Artemis [M4B]", 10),
            ])
            .await;

        let reply = h.service.handle_text("more books by andy weir", "o").await;
        match &reply.outcome {
            Some(AcquisitionOutcome::Options { candidates }) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(reply.message.contains("2. Andy Weir - Artemis [M4B]"));
        assert!(h.client.added_torrents().await.is_empty());

        let reply = h.service.handle_text("2", "o").await;
        match reply.outcome {
            Some(AcquisitionOutcome::Tracking { title, .. }) => {
                assert_eq!(title, "Andy Weir - Artemis [M4B]")
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        // The list is used up once something was picked from it
        assert!(!h.service.pending.read().await.contains_key("o"));
        let reply = h.service.handle_text("1", "o").await;
        assert!(reply.message.contains("Search for a book first"));
    }

    #[tokio::test]
    async fn test_pending_lists_are_capped() {
        let h = harness();
        let candidates = vec![fixtures::candidate("Dune [M4B]", 5)];
        for i in 0..=MAX_PENDING_OWNERS {
            h.service
                .remember(&format!("owner-{}", i), "dune", FormatTier::M4b, &candidates)
                .await;
        }

        let pending = h.service.pending.read().await;
        assert_eq!(pending.len(), MAX_PENDING_OWNERS);
        assert!(!pending.contains_key("owner-0"));
        assert!(pending.contains_key(&format!("owner-{}", MAX_PENDING_OWNERS)));
    }

    #[tokio::test]
    async fn test_select_without_list() {
        let h = harness();
        let reply = h.service.handle_text("1", "o").await;
        assert!(reply.outcome.is_none());
        assert!(reply.message.contains("Search for a book first"));
    }

    #[tokio::test]
    async fn test_select_out_of_range() {
        let h = harness();
        h.searcher
            .set_results(vec![fixtures::candidate("Andy Weir - Artemis [M4B]", 10)])
            .await;
        h.service.handle_text("more books by andy weir", "o").await;

        let err = h.service.select(4, "o").await.unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::InvalidSelection {
                selected: 4,
                available: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_untracked_submission() {
        let h = harness();
        h.client.set_register_on_add(false);
        h.searcher
            .set_results(vec![fixtures::candidate("Dune [M4B]", 5)])
            .await;

        let reply = h.service.handle_text("find dune", "o").await;
        assert!(matches!(
            reply.outcome,
            Some(AcquisitionOutcome::SubmittedUntracked { .. })
        ));
        assert!(h.service.monitor().store().is_empty().await);
    }

    #[tokio::test]
    async fn test_help_and_status() {
        let h = harness();
        let reply = h.service.handle_text("help", "o").await;
        assert_eq!(reply.parsed.intent, Intent::Help);
        assert!(reply.message.contains("find"));

        let reply = h.service.handle_text("status", "o").await;
        assert_eq!(reply.message, "Nothing of yours is downloading right now.");
    }
}
