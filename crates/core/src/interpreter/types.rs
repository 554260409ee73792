//! Types produced by the request interpreter.

use serde::{Deserialize, Serialize};

/// Author sentinel used when the request names no author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Default request language.
pub const DEFAULT_LANGUAGE: &str = "en";

/// What the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Intent {
    Help,
    Status,
    /// Pick entry `n` (1-based) from a previously shown list.
    Select(u32),
    /// Other titles by the same author.
    MoreByAuthor,
    Search,
    Unknown,
}

impl Intent {
    /// Whether this intent carries something to search for.
    pub fn is_search(&self) -> bool {
        matches!(self, Intent::Search | Intent::MoreByAuthor)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    #[default]
    Audiobook,
}

/// Structured acquisition request extracted from free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRequest {
    /// May be empty for author-only lookups.
    pub title: String,
    pub author: String,
    pub format: MediaFormat,
    pub language: String,
    /// Free-form quality hint such as `m4b` or `unabridged`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl AcquisitionRequest {
    pub fn new(title: &str, author: Option<&str>) -> Self {
        let author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_AUTHOR);

        Self {
            title: title.trim().to_string(),
            author: author.to_string(),
            format: MediaFormat::Audiobook,
            language: DEFAULT_LANGUAGE.to_string(),
            quality: None,
        }
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn has_known_author(&self) -> bool {
        !self.author.is_empty() && self.author != UNKNOWN_AUTHOR
    }

    /// Short human-readable description, e.g. `"Dune" by Frank Herbert`.
    pub fn describe(&self) -> String {
        match (self.title.is_empty(), self.has_known_author()) {
            (false, true) => format!("\"{}\" by {}", self.title, self.author),
            (false, false) => format!("\"{}\"", self.title),
            (true, true) => format!("books by {}", self.author),
            (true, false) => "your request".to_string(),
        }
    }
}

/// Interpreter output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedInput {
    pub intent: Intent,
    /// 0.0 - 1.0
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<AcquisitionRequest>,
}

impl ParsedInput {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            extracted: None,
        }
    }
}
