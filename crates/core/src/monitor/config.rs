//! Download monitor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the download monitor (`[monitor]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// When disabled, downloads are tracked but never polled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// How often to poll the download client (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// How long progress may stay flat before a download counts as stalled (seconds).
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold_secs: u64,

    /// Automatic replacement attempts per request lineage.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long completed entries stay visible before removal (seconds).
    #[serde(default = "default_completion_grace")]
    pub completion_grace_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    30
}

fn default_stall_threshold() -> u64 {
    600 // 10 minutes
}

fn default_max_retries() -> u32 {
    2
}

fn default_completion_grace() -> u64 {
    300
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_poll_interval(),
            stall_threshold_secs: default_stall_threshold(),
            max_retries: default_max_retries(),
            completion_grace_secs: default_completion_grace(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stall_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stall_threshold_secs as i64)
    }

    pub fn completion_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.completion_grace_secs as i64)
    }
}
