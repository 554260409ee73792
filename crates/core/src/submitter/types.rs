//! Submitter types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::torrent_client::TorrentClientError;

/// Submitter configuration (`[submitter]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitterConfig {
    /// Pause after submission before asking the client which item it created.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    3_000
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Result of an accepted submission.
///
/// The client accepted the locator either way; `hash` is `None` when the new
/// item could not be told apart from the others in the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SubmitOutcome {
    pub fn identified(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            name: Some(name.into()),
        }
    }

    pub fn unidentified() -> Self {
        Self::default()
    }

    pub fn is_identified(&self) -> bool {
        self.hash.is_some()
    }
}

/// Errors from submitting a locator to the download client.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Download client rejected credentials: {0}")]
    Authentication(String),

    #[error("Download client refused the torrent: {0}")]
    Rejected(String),

    #[error("Download client error: {0}")]
    Transport(#[source] TorrentClientError),
}

impl From<TorrentClientError> for SubmitError {
    fn from(err: TorrentClientError) -> Self {
        match err {
            TorrentClientError::AuthenticationFailed(msg) => SubmitError::Authentication(msg),
            TorrentClientError::Rejected(msg) => SubmitError::Rejected(msg),
            other => SubmitError::Transport(other),
        }
    }
}

impl SubmitError {
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmitError::InvalidLocator(_) | SubmitError::Rejected(_) => {
                "Sorry, the download client wouldn't accept that release. Try another one."
            }
            SubmitError::Authentication(_) => {
                "Sorry, the download client is misconfigured at the moment. Please let the administrator know."
            }
            SubmitError::Transport(_) => {
                "Sorry, the download client isn't responding right now. Please try again in a few minutes."
            }
        }
    }
}
