//! Types for the indexer search system.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Retryable;

/// Content category for restricting an indexer query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Audiobook,
    Audio,
    Books,
    Ebook,
}

impl SearchCategory {
    /// Newznab category id understood by the aggregation service.
    pub fn newznab_id(&self) -> u32 {
        match self {
            SearchCategory::Audiobook => 3030,
            SearchCategory::Audio => 3000,
            SearchCategory::Books => 7000,
            SearchCategory::Ebook => 7020,
        }
    }
}

/// Order applied to filtered candidates before tiering.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    SeedersDesc,
    NewestFirst,
}

/// Request fields that contribute to the free-text query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    Author,
}

/// Preferred audiobook container.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatPreference {
    #[default]
    M4b,
    Mp3,
}

/// Which format bucket a search result was drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatTier {
    M4b,
    Mp3,
    Audio,
    Unfiltered,
    Empty,
}

impl FormatTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTier::M4b => "m4b",
            FormatTier::Mp3 => "mp3",
            FormatTier::Audio => "audio",
            FormatTier::Unfiltered => "unfiltered",
            FormatTier::Empty => "empty",
        }
    }
}

/// Wire-level query sent to a [`Searcher`] backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerQuery {
    /// Free-text search query.
    pub query: String,
    /// Categories to restrict the query to.
    #[serde(default)]
    pub categories: Vec<SearchCategory>,
    /// Limit to specific indexers (empty = all).
    #[serde(default)]
    pub indexer_ids: Vec<i32>,
    /// Bound on a single request attempt. Each retry gets a fresh bound.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// A single release returned by the indexer aggregation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable id assigned by the indexer.
    pub guid: String,
    /// Raw release title.
    pub title: String,
    pub size_bytes: u64,
    /// .torrent download URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    pub seeders: u32,
    pub leechers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    pub indexer_id: i32,
}

impl Candidate {
    /// The locator handed to the download client (magnet preferred).
    pub fn locator(&self) -> Option<&str> {
        self.magnet_uri
            .as_deref()
            .or(self.download_url.as_deref())
            .filter(|l| !l.is_empty())
    }

    /// Whether `locator` refers to this candidate.
    pub fn has_locator(&self, locator: &str) -> bool {
        self.magnet_uri.as_deref() == Some(locator) || self.download_url.as_deref() == Some(locator)
    }
}

/// Options for one search through the [`SearchEngine`](super::SearchEngine).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub indexer_ids: Vec<i32>,
    pub categories: Vec<SearchCategory>,
    pub sort: SortOrder,
    pub fields: Vec<SearchField>,
    pub preferred_format: FormatPreference,
    /// Return the unfiltered remainder when no audio tier matches.
    pub allow_fallback: bool,
    pub min_seeders: u32,
    /// Language tag that must appear bracketed in the title.
    pub language: Option<String>,
    /// Regex the title must match (case-insensitive).
    pub title_filter: Option<String>,
    /// Per-attempt request timeout handed to the backend.
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            indexer_ids: Vec::new(),
            categories: vec![SearchCategory::Audiobook],
            sort: SortOrder::SeedersDesc,
            fields: vec![SearchField::Title, SearchField::Author],
            preferred_format: FormatPreference::M4b,
            allow_fallback: true,
            min_seeders: 1,
            language: None,
            title_filter: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Search preferences (`[search]` config section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPreferences {
    /// Limit to specific indexers (empty = all).
    #[serde(default)]
    pub indexer_ids: Vec<i32>,
    #[serde(default = "default_categories")]
    pub categories: Vec<SearchCategory>,
    #[serde(default)]
    pub preferred_format: FormatPreference,
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
    /// Required bracketed language tag, e.g. `"en"`. Unset disables the filter.
    #[serde(default)]
    pub language: Option<String>,
    /// Minimum seeders when searching for a stall replacement.
    #[serde(default = "default_retry_min_seeders")]
    pub retry_min_seeders: u32,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_categories() -> Vec<SearchCategory> {
    vec![SearchCategory::Audiobook]
}

fn default_allow_fallback() -> bool {
    true
}

fn default_min_seeders() -> u32 {
    1
}

fn default_retry_min_seeders() -> u32 {
    3
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchPreferences {
    fn default() -> Self {
        Self {
            indexer_ids: Vec::new(),
            categories: default_categories(),
            preferred_format: FormatPreference::default(),
            allow_fallback: default_allow_fallback(),
            min_seeders: default_min_seeders(),
            language: None,
            retry_min_seeders: default_retry_min_seeders(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl SearchPreferences {
    /// Seeder floor for replacement searches; always stricter than the normal one.
    pub fn effective_retry_min_seeders(&self) -> u32 {
        self.retry_min_seeders.max(self.min_seeders + 1)
    }
}

impl SearchOptions {
    /// Options for an interactive search under the configured preferences.
    pub fn from_preferences(prefs: &SearchPreferences) -> Self {
        Self {
            indexer_ids: prefs.indexer_ids.clone(),
            categories: prefs.categories.clone(),
            preferred_format: prefs.preferred_format,
            allow_fallback: prefs.allow_fallback,
            min_seeders: prefs.min_seeders,
            language: prefs.language.clone(),
            timeout: Duration::from_secs(prefs.timeout_secs),
            ..Self::default()
        }
    }

    /// Options for a stall replacement search: same preferences, stricter seeders.
    pub fn for_retry(prefs: &SearchPreferences) -> Self {
        Self {
            min_seeders: prefs.effective_retry_min_seeders(),
            ..Self::from_preferences(prefs)
        }
    }
}

/// Ranked, tiered outcome of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub candidates: Vec<Candidate>,
    pub format: FormatTier,
    /// Number of releases the indexer returned before filtering.
    pub total: usize,
}

impl SearchResult {
    pub fn empty(total: usize) -> Self {
        Self {
            candidates: Vec::new(),
            format: FormatTier::Empty,
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// Reachability of the indexer aggregation service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexerHealth {
    Up,
    Degraded,
    Down,
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search backend connection failed: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Search backend rejected credentials: {0}")]
    Authentication(String),

    #[error("Search backend rejected request (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Search backend error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Rate limited, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    #[error("Invalid search options: {0}")]
    InvalidOptions(String),
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Network(_)
                | SearchError::Timeout
                | SearchError::Server { .. }
                | SearchError::RateLimited { .. }
        )
    }
}

impl SearchError {
    /// Message that is safe to show to the requesting user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SearchError::Network(_) | SearchError::Timeout => {
                "Sorry, the search service isn't responding right now. Please try again in a few minutes."
            }
            SearchError::RateLimited { .. } => {
                "Sorry, too many searches are running at once. Please wait a moment and try again."
            }
            SearchError::Server { .. } => {
                "Sorry, the search service ran into a problem. Please try again shortly."
            }
            SearchError::Authentication(_) => {
                "Sorry, search is misconfigured at the moment. Please let the administrator know."
            }
            SearchError::Client { .. }
            | SearchError::InvalidResponse(_)
            | SearchError::InvalidOptions(_) => {
                "Sorry, that search couldn't be completed. Try rephrasing the title or author."
            }
        }
    }
}

/// Trait for indexer search backends.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Execute one query. Transient failures are retried by the implementation.
    async fn search(&self, query: &IndexerQuery) -> Result<Vec<Candidate>, SearchError>;

    /// Lightweight reachability probe; never retried.
    async fn probe(&self) -> IndexerHealth;
}
