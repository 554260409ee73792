//! Replacement search for stalled downloads.

use std::sync::Arc;

use tracing::{debug, info};

use crate::searcher::{Candidate, SearchEngine, SearchOptions, SearchPreferences};
use crate::submitter::Submitter;
use crate::torrent_client::extract_hash_from_magnet;

use super::{MonitorError, TrackedDownload};

const GATE_STOPWORDS: [&str; 3] = ["the", "a", "an"];

/// Finds and submits an alternative release for a stalled download.
pub struct Failover {
    engine: Arc<SearchEngine>,
    submitter: Arc<Submitter>,
    preferences: SearchPreferences,
}

impl Failover {
    pub fn new(
        engine: Arc<SearchEngine>,
        submitter: Arc<Submitter>,
        preferences: SearchPreferences,
    ) -> Self {
        Self {
            engine,
            submitter,
            preferences,
        }
    }

    pub fn submitter(&self) -> &Arc<Submitter> {
        &self.submitter
    }

    /// Re-run the stored query with a stricter seeder floor and pick the best
    /// candidate that is not the stalled release.
    pub async fn find_replacement(
        &self,
        download: &TrackedDownload,
    ) -> Result<Option<Candidate>, MonitorError> {
        let Some(query) = download.search_query.as_deref() else {
            debug!(hash = %download.hash, "No stored query, cannot search for a replacement");
            return Ok(None);
        };

        let options = SearchOptions::for_retry(&self.preferences);
        let result = self.engine.search(query, &options).await?;
        let gate = relevance_token(&download.name);

        // Candidates arrive sorted by seeders, so the first survivor is the best.
        let replacement = result.candidates.into_iter().find(|c| {
            c.locator().is_some()
                && !download
                    .locator
                    .as_deref()
                    .is_some_and(|previous| c.has_locator(previous))
                && !same_hash(c, &download.hash)
                && passes_gate(gate.as_deref(), &c.title)
        });

        match &replacement {
            Some(c) => info!(
                hash = %download.hash,
                replacement = %c.title,
                seeders = c.seeders,
                "Found replacement release"
            ),
            None => info!(hash = %download.hash, query = query, "No replacement release found"),
        }
        Ok(replacement)
    }
}

fn same_hash(candidate: &Candidate, hash: &str) -> bool {
    candidate
        .magnet_uri
        .as_deref()
        .and_then(extract_hash_from_magnet)
        .is_some_and(|h| h.eq_ignore_ascii_case(hash))
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Leading significant word of a release name, used to reject unrelated replacements.
pub(crate) fn relevance_token(name: &str) -> Option<String> {
    tokens(name).find(|t| t.chars().count() >= 2 && !GATE_STOPWORDS.contains(&t.as_str()))
}

/// No token means nothing to compare against, so everything passes.
pub(crate) fn passes_gate(token: Option<&str>, title: &str) -> bool {
    match token {
        Some(token) => tokens(title).any(|t| t == token),
        None => true,
    }
}
