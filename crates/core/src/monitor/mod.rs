//! Download monitor: supervises submitted downloads, reports completion,
//! and replaces stalled releases.

mod config;
mod events;
mod failover;
mod runner;
mod store;
mod types;

pub use config::MonitorConfig;
pub use events::{event_channel, EventEnvelope, EventHandle, MonitorEvent};
pub use failover::Failover;
pub use runner::DownloadMonitor;
pub use store::DownloadStore;
pub use types::*;
