//! Rule-based request interpreter.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{AcquisitionRequest, Intent, ParsedInput};

const EXACT: f32 = 1.0;
const MORE_BY_CONFIDENCE: f32 = 0.9;
const VERB_SEARCH_CONFIDENCE: f32 = 0.85;
const FALLBACK_CONFIDENCE: f32 = 0.4;

/// Shortest free text treated as a bare title.
const MIN_FALLBACK_LEN: usize = 3;

/// Leftovers that are not a title on their own.
const FILLER: [&str; 8] = ["a", "an", "the", "me", "it", "this", "something", "one"];

fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){}", pattern)).expect("interpreter pattern is valid")
}

static HELP: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:help|commands|\?|what can you do|how does (?:this|it) work)$"));

static STATUS: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?:show\s+)?(?:status|progress|queue|downloads|my downloads|what'?s downloading)$")
});

static SELECT: Lazy<Regex> = Lazy::new(|| compile(r"^#?(\d{1,4})$"));

static MORE_BY: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?:show\s+me\s+|find\s+|get\s+)?(?:more|other)\s+(?:audio\s*books|books|titles)?\s*(?:by|from)\s+(.+)$")
});

static VERB: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^(?:please\s+)?(?:can\s+you\s+|could\s+you\s+)?(?:search\s+for|search|find|get|download|grab|look\s+for|look\s+up|i\s+want|i'?d\s+like)\s+(.+)$",
    )
});

static QUALITY: Lazy<Regex> =
    Lazy::new(|| compile(r"(?:\s+in)?\s*\b(unabridged|m4b|mp3)\b(?:\s+format)?"));

static ME_PREFIX: Lazy<Regex> = Lazy::new(|| compile(r"^me\s+(.+)$"));

static AUDIOBOOK_PREFIX: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:(?:an?|the)\s+)?audio\s*books?\s+(?:of\s+|for\s+)?(.+)$"));

// "books" only counts as boilerplate when a title or author marker follows
static BOOKS_PREFIX: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?:(?:an?|the)\s+)?books?\s+((?:by|with|titled|called|named)\b.*)$")
});

static TITLE_MARKER: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(?:with\s+(?:the\s+)?(?:title|name)|titled|called|named)\s+(.+)$")
});

static TRAILING: Lazy<Regex> = Lazy::new(|| {
    compile(r"^(.+?)(?:\s+(?:as\s+)?(?:(?:an?|the)\s+)?audio\s*books?|\s+please)+$")
});

static AUTHOR_SPLIT: Lazy<Regex> = Lazy::new(|| compile(r"^(?:(.*)\s)?by\s+(.+)$"));

/// Interpret free text. Never fails; unrecognised input yields [`Intent::Unknown`].
pub fn parse(text: &str) -> ParsedInput {
    let text = normalize(text);
    if text.is_empty() {
        return ParsedInput::unknown();
    }

    if HELP.is_match(&text) {
        return exact(Intent::Help);
    }
    if STATUS.is_match(&text) {
        return exact(Intent::Status);
    }
    if let Some(n) = SELECT
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        return exact(Intent::Select(n));
    }

    if let Some(caps) = MORE_BY.captures(&text) {
        let author = clean(caps.get(1).map_or("", |m| m.as_str()));
        if !author.is_empty() {
            return ParsedInput {
                intent: Intent::MoreByAuthor,
                confidence: MORE_BY_CONFIDENCE,
                extracted: Some(AcquisitionRequest::new("", Some(&author))),
            };
        }
    }

    if let Some(caps) = VERB.captures(&text) {
        let remainder = caps.get(1).map_or("", |m| m.as_str());
        return match extract(remainder) {
            Some(request) => search(request, VERB_SEARCH_CONFIDENCE),
            None => ParsedInput::unknown(),
        };
    }

    if text.chars().count() >= MIN_FALLBACK_LEN {
        if let Some(request) = extract(&text) {
            return search(request, FALLBACK_CONFIDENCE);
        }
    }

    ParsedInput::unknown()
}

fn exact(intent: Intent) -> ParsedInput {
    ParsedInput {
        intent,
        confidence: EXACT,
        extracted: None,
    }
}

fn search(request: AcquisitionRequest, confidence: f32) -> ParsedInput {
    ParsedInput {
        intent: Intent::Search,
        confidence,
        extracted: Some(request),
    }
}

/// Collapse whitespace and drop trailing punctuation.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_string()
}

fn clean(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim()
        .trim_end_matches([',', '.', '!', '?'])
        .trim()
        .to_string()
}

/// Replace `s` with the first capture group when `re` matches.
fn strip(re: &Regex, s: String) -> String {
    match re.captures(&s).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => s,
    }
}

/// Pull title, author and quality hint out of search text.
fn extract(text: &str) -> Option<AcquisitionRequest> {
    let quality = QUALITY
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase());
    let mut rest = QUALITY.replace_all(text, "").trim().to_string();

    for re in [&*ME_PREFIX, &*AUDIOBOOK_PREFIX, &*BOOKS_PREFIX, &*TITLE_MARKER, &*TRAILING] {
        rest = strip(re, rest);
    }

    let (title, author) = match AUTHOR_SPLIT.captures(&rest) {
        Some(caps) => (
            clean(caps.get(1).map_or("", |m| m.as_str())),
            Some(clean(caps.get(2).map_or("", |m| m.as_str()))),
        ),
        None => (clean(&rest), None),
    };
    let title = if FILLER.iter().any(|f| title.eq_ignore_ascii_case(f)) {
        String::new()
    } else {
        title
    };

    let request = AcquisitionRequest::new(&title, author.as_deref());
    if request.title.is_empty() && !request.has_known_author() {
        return None;
    }

    Some(match quality {
        Some(q) => request.with_quality(q),
        None => request,
    })
}
