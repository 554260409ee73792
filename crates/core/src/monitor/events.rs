//! Lifecycle events emitted by the download monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Download lifecycle events. Every event names the owner it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    Tracked {
        owner: String,
        hash: String,
        name: String,
    },
    Completed {
        owner: String,
        hash: String,
        name: String,
        size_bytes: u64,
        seeds: u32,
        elapsed_minutes: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        save_path: Option<String>,
    },
    StallRetryAttempted {
        owner: String,
        hash: String,
        name: String,
        retry_count: u32,
        max_retries: u32,
    },
    RetrySucceeded {
        owner: String,
        old_hash: String,
        old_name: String,
        new_hash: String,
        new_name: String,
    },
    Failed {
        owner: String,
        hash: String,
        name: String,
        retry_count: u32,
    },
}

impl MonitorEvent {
    pub fn owner(&self) -> &str {
        match self {
            MonitorEvent::Tracked { owner, .. }
            | MonitorEvent::Completed { owner, .. }
            | MonitorEvent::StallRetryAttempted { owner, .. }
            | MonitorEvent::RetrySucceeded { owner, .. }
            | MonitorEvent::Failed { owner, .. } => owner,
        }
    }

    /// Hash the event is about (the new one for a replacement).
    pub fn hash(&self) -> &str {
        match self {
            MonitorEvent::Tracked { hash, .. }
            | MonitorEvent::Completed { hash, .. }
            | MonitorEvent::StallRetryAttempted { hash, .. }
            | MonitorEvent::Failed { hash, .. } => hash,
            MonitorEvent::RetrySucceeded { new_hash, .. } => new_hash,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MonitorEvent::Tracked { .. } => "tracked",
            MonitorEvent::Completed { .. } => "completed",
            MonitorEvent::StallRetryAttempted { .. } => "stall_retry_attempted",
            MonitorEvent::RetrySucceeded { .. } => "retry_succeeded",
            MonitorEvent::Failed { .. } => "failed",
        }
    }
}

/// Envelope wrapping an event with its emission time.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: MonitorEvent,
}

/// Handle for emitting monitor events.
///
/// Cheaply cloneable. A full or closed channel is logged, never surfaced to
/// the caller.
#[derive(Debug, Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: MonitorEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit monitor event: {}", e);
        }
    }
}

/// Create a bounded event channel.
pub fn event_channel(buffer: usize) -> (EventHandle, mpsc::Receiver<EventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventHandle::new(tx), rx)
}
