//! Types for the end-to-end acquisition flow.

use serde::Serialize;
use thiserror::Error;

use crate::interpreter::ParsedInput;
use crate::searcher::{Candidate, FormatTier, SearchError};
use crate::submitter::SubmitError;

/// Errors from one acquisition attempt.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("submit failed: {0}")]
    Submit(#[from] SubmitError),

    #[error("nothing to select from")]
    NothingToSelect,

    #[error("selection {selected} out of range (1-{available})")]
    InvalidSelection { selected: u32, available: usize },
}

impl AcquisitionError {
    /// Safe, user-facing text.
    pub fn user_message(&self) -> String {
        match self {
            AcquisitionError::Search(e) => e.user_message().to_string(),
            AcquisitionError::Submit(e) => e.user_message().to_string(),
            AcquisitionError::NothingToSelect => {
                "There is nothing to pick from yet. Search for a book first.".to_string()
            }
            AcquisitionError::InvalidSelection { available, .. } => {
                format!("Pick a number between 1 and {}.", available)
            }
        }
    }
}

/// What an acquisition attempt produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionOutcome {
    /// Submitted and under supervision.
    Tracking {
        hash: String,
        name: String,
        title: String,
        format: FormatTier,
        seeders: u32,
    },
    /// The chosen release is already being tracked.
    AlreadyTracking { hash: String, name: String },
    /// Submitted, but the client item could not be identified.
    SubmittedUntracked { title: String },
    /// A list to choose from (author lookups).
    Options { candidates: Vec<Candidate> },
    NoResults { total: usize },
}

/// Response to one piece of user text.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReply {
    pub parsed: ParsedInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AcquisitionOutcome>,
    pub message: String,
}

/// Candidates most recently shown to an owner, for numeric selection.
#[derive(Debug, Clone)]
pub(crate) struct PendingChoice {
    pub query: String,
    pub format: FormatTier,
    pub candidates: Vec<Candidate>,
    /// Insertion order, for evicting the stalest owner.
    pub seq: u64,
}
