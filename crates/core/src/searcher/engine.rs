//! Search engine: one indexer query, then filtering and format tiering.
//!
//! The tier order is fixed: M4B, then MP3, then anything that looks like
//! audio, then (when fallback is allowed) the unfiltered remainder. The first
//! non-empty tier wins and tags the result. An MP3 preference swaps the first
//! two tiers.

use std::sync::Arc;

use regex_lite::{Regex, RegexBuilder};
use tracing::debug;

use crate::interpreter::AcquisitionRequest;

use super::{
    Candidate, FormatPreference, FormatTier, IndexerQuery, SearchError, SearchField,
    SearchOptions, SearchResult, Searcher, SortOrder,
};

const AUDIO_MARKERS: [&str; 4] = ["audio", "mp3", "m4a", "m4b"];

/// Ranked search over a [`Searcher`] backend.
pub struct SearchEngine {
    searcher: Arc<dyn Searcher>,
}

impl SearchEngine {
    pub fn new(searcher: Arc<dyn Searcher>) -> Self {
        Self { searcher }
    }

    pub fn searcher(&self) -> &Arc<dyn Searcher> {
        &self.searcher
    }

    /// Search for a free-text query.
    ///
    /// Exhausted retries surface as errors; an empty tiered result is `Ok`.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, SearchError> {
        let filters = CandidateFilters::compile(options)?;

        let indexer_query = IndexerQuery {
            query: query.to_string(),
            categories: options.categories.clone(),
            indexer_ids: options.indexer_ids.clone(),
            timeout: Some(options.timeout),
        };

        let raw = self.searcher.search(&indexer_query).await?;

        let total = raw.len();
        let mut eligible: Vec<Candidate> = raw.into_iter().filter(|c| filters.accepts(c)).collect();
        sort_candidates(&mut eligible, options.sort);

        let result = select_tier(eligible, options.preferred_format, options.allow_fallback, total);
        debug!(
            query = query,
            total = total,
            returned = result.candidates.len(),
            format = result.format.as_str(),
            "Search ranked"
        );
        Ok(result)
    }

    /// Search for a structured request, composing the query from the configured fields.
    pub async fn search_request(
        &self,
        request: &AcquisitionRequest,
        options: &SearchOptions,
    ) -> Result<SearchResult, SearchError> {
        let query = compose_query(request, &options.fields);
        if query.is_empty() {
            return Ok(SearchResult::empty(0));
        }
        self.search(&query, options).await
    }
}

/// Build the free-text query for a request.
pub fn compose_query(request: &AcquisitionRequest, fields: &[SearchField]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for field in fields {
        match field {
            SearchField::Title if !request.title.is_empty() => parts.push(&request.title),
            SearchField::Author if request.has_known_author() => parts.push(&request.author),
            _ => {}
        }
    }
    // Author-only lookups still need something to search for
    if parts.is_empty() && request.has_known_author() {
        parts.push(&request.author);
    }
    parts.join(" ").trim().to_string()
}

/// Compiled per-search filters.
struct CandidateFilters {
    title: Option<Regex>,
    language: Option<Regex>,
    min_seeders: u32,
}

impl CandidateFilters {
    fn compile(options: &SearchOptions) -> Result<Self, SearchError> {
        let title = options
            .title_filter
            .as_deref()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SearchError::InvalidOptions(format!("title filter: {}", e)))
            })
            .transpose()?;

        let language = options
            .language
            .as_deref()
            .filter(|tag| !tag.trim().is_empty())
            .map(language_pattern)
            .transpose()?;

        Ok(Self {
            title,
            language,
            min_seeders: options.min_seeders,
        })
    }

    fn accepts(&self, candidate: &Candidate) -> bool {
        if let Some(re) = &self.title {
            if !re.is_match(&candidate.title) {
                return false;
            }
        }
        if let Some(re) = &self.language {
            if !re.is_match(&candidate.title) {
                return false;
            }
        }
        candidate.seeders >= self.min_seeders
    }
}

/// Case-insensitive pattern for a language tag inside brackets or parentheses,
/// e.g. `[EN]`, `(eng)`, `[M4B, English]`.
fn language_pattern(tag: &str) -> Result<Regex, SearchError> {
    let tag = tag.trim().to_lowercase();
    let mut names = vec![regex_lite::escape(&tag)];
    if let Some(name) = language_name(&tag) {
        names.push(name.to_string());
    }
    let pattern = format!(r"[\[(][^\])]*\b(?:{})\b[^\])]*[\])]", names.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SearchError::InvalidOptions(format!("language tag: {}", e)))
}

fn language_name(tag: &str) -> Option<&'static str> {
    match tag {
        "en" | "eng" => Some("english"),
        "de" | "ger" | "deu" => Some("german"),
        "fr" | "fre" | "fra" => Some("french"),
        "es" | "spa" => Some("spanish"),
        "it" | "ita" => Some("italian"),
        _ => None,
    }
}

/// Stable sort; ties keep indexer order.
fn sort_candidates(candidates: &mut [Candidate], order: SortOrder) {
    match order {
        SortOrder::SeedersDesc => candidates.sort_by(|a, b| b.seeders.cmp(&a.seeders)),
        SortOrder::NewestFirst => candidates.sort_by(|a, b| b.publish_date.cmp(&a.publish_date)),
    }
}

impl FormatTier {
    /// Whether a title belongs to this tier.
    pub fn matches(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        match self {
            FormatTier::M4b => title.contains("m4b"),
            FormatTier::Mp3 => title.contains("mp3"),
            FormatTier::Audio => AUDIO_MARKERS.iter().any(|m| title.contains(m)),
            FormatTier::Unfiltered => true,
            FormatTier::Empty => false,
        }
    }
}

/// Pick the first non-empty format bucket. Input order is preserved.
pub fn select_tier(
    candidates: Vec<Candidate>,
    preferred: FormatPreference,
    allow_fallback: bool,
    total: usize,
) -> SearchResult {
    let order = match preferred {
        FormatPreference::M4b => [FormatTier::M4b, FormatTier::Mp3, FormatTier::Audio],
        FormatPreference::Mp3 => [FormatTier::Mp3, FormatTier::M4b, FormatTier::Audio],
    };

    for tier in order {
        let bucket: Vec<Candidate> = candidates
            .iter()
            .filter(|c| tier.matches(&c.title))
            .cloned()
            .collect();
        if !bucket.is_empty() {
            return SearchResult {
                candidates: bucket,
                format: tier,
                total,
            };
        }
    }

    if allow_fallback && !candidates.is_empty() {
        return SearchResult {
            candidates,
            format: FormatTier::Unfiltered,
            total,
        };
    }

    SearchResult::empty(total)
}
