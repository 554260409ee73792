//! Notification sink: turns monitor events into user-facing text and logs them.

use tokio::sync::mpsc;
use tracing::{info, warn};

use shelfhound_core::{EventEnvelope, MonitorEvent};

/// Consumes monitor events until every sender is gone.
pub struct Notifier {
    rx: mpsc::Receiver<EventEnvelope>,
}

impl Notifier {
    pub fn new(rx: mpsc::Receiver<EventEnvelope>) -> Self {
        Self { rx }
    }

    /// Spawn this as a background task.
    pub async fn run(mut self) {
        info!("Notifier started");

        while let Some(envelope) = self.rx.recv().await {
            let event = &envelope.event;
            let message = render(event);
            match event {
                MonitorEvent::Failed { .. } | MonitorEvent::StallRetryAttempted { .. } => warn!(
                    owner = event.owner(),
                    hash = event.hash(),
                    kind = event.kind(),
                    at = %envelope.timestamp,
                    "{}",
                    message
                ),
                _ => info!(
                    owner = event.owner(),
                    hash = event.hash(),
                    kind = event.kind(),
                    at = %envelope.timestamp,
                    "{}",
                    message
                ),
            }
        }

        info!("Notifier shutting down");
    }
}

/// Message shown to the owner of the download.
pub fn render(event: &MonitorEvent) -> String {
    match event {
        MonitorEvent::Tracked { name, .. } => format!("Started downloading {}.", name),
        MonitorEvent::Completed {
            name,
            size_bytes,
            seeds,
            elapsed_minutes,
            ..
        } => format!(
            "{} is ready ({}, {} seeds, took {} min).",
            name,
            human_size(*size_bytes),
            seeds,
            elapsed_minutes
        ),
        MonitorEvent::StallRetryAttempted {
            name,
            retry_count,
            max_retries,
            ..
        } => format!(
            "{} stopped making progress. Looking for another release (attempt {} of {}).",
            name, retry_count, max_retries
        ),
        MonitorEvent::RetrySucceeded {
            old_name, new_name, ..
        } => format!("Switched from {} to {}.", old_name, new_name),
        MonitorEvent::Failed {
            name, retry_count, ..
        } => format!(
            "Giving up on {} after {} retries. Try asking for it again later.",
            name, retry_count
        ),
    }
}

fn human_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    let mib = bytes as f64 / MIB;
    if mib >= 1024.0 {
        format!("{:.1} GiB", mib / 1024.0)
    } else {
        format!("{:.0} MiB", mib)
    }
}
