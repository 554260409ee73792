//! Download client abstraction.
//!
//! This module provides a `TorrentClient` trait over the download client
//! (qBittorrent Web API v2) used by the submitter and the download monitor.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
