use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::monitor::MonitorConfig;
use crate::retry::RetryConfig;
use crate::searcher::{RateLimitConfig, SearchPreferences};
use crate::submitter::SubmitterConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub searcher: SearcherConfig,
    #[serde(default)]
    pub search: SearchPreferences,
    pub torrent_client: TorrentClientConfig,
    #[serde(default)]
    pub submitter: SubmitterConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Searcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearcherConfig {
    /// Search backend type
    pub backend: SearcherBackend,
    /// Prowlarr-specific configuration (required when backend = "prowlarr")
    #[serde(default)]
    pub prowlarr: Option<ProwlarrConfig>,
}

/// Available search backends
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearcherBackend {
    Prowlarr,
}

/// Prowlarr indexer aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProwlarrConfig {
    /// Prowlarr server URL (e.g., "http://localhost:9696")
    pub url: String,
    pub api_key: String,
    /// Search request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Health probe timeout in seconds (default: 5)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

fn default_probe_timeout() -> u32 {
    5
}

/// Download client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentClientConfig {
    pub backend: TorrentClientBackend,
    /// Required when backend = "qbittorrent"
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TorrentClientBackend {
    #[serde(rename = "qbittorrent")]
    QBittorrent,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// WebUI URL (e.g., "http://localhost:8080")
    pub url: String,
    /// Omit both credentials when the WebUI bypasses auth for this host.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Category applied to submissions and used to recover their hash.
    #[serde(default = "default_category")]
    pub category: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_category() -> Option<String> {
    Some("audiobooks".to_string())
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub searcher: SanitizedSearcherConfig,
    pub search: SearchPreferences,
    pub torrent_client: SanitizedTorrentClientConfig,
    pub submitter: SubmitterConfig,
    pub monitor: MonitorConfig,
    pub retry: RetryConfig,
    pub rate_limit: RateLimitConfig,
}

/// Sanitized searcher config (API key redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearcherConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prowlarr: Option<SanitizedProwlarrConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProwlarrConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub probe_timeout_secs: u32,
}

/// Sanitized download client config (password redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTorrentClientConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qbittorrent: Option<SanitizedQBittorrentConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQBittorrentConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            searcher: SanitizedSearcherConfig {
                backend: match config.searcher.backend {
                    SearcherBackend::Prowlarr => "prowlarr".to_string(),
                },
                prowlarr: config
                    .searcher
                    .prowlarr
                    .as_ref()
                    .map(|p| SanitizedProwlarrConfig {
                        url: p.url.clone(),
                        api_key_configured: !p.api_key.is_empty(),
                        timeout_secs: p.timeout_secs,
                        probe_timeout_secs: p.probe_timeout_secs,
                    }),
            },
            search: config.search.clone(),
            torrent_client: SanitizedTorrentClientConfig {
                backend: match config.torrent_client.backend {
                    TorrentClientBackend::QBittorrent => "qbittorrent".to_string(),
                },
                qbittorrent: config
                    .torrent_client
                    .qbittorrent
                    .as_ref()
                    .map(|q| SanitizedQBittorrentConfig {
                        url: q.url.clone(),
                        username: q.username.clone(),
                        password_configured: q.password.as_deref().is_some_and(|p| !p.is_empty()),
                        category: q.category.clone(),
                        timeout_secs: q.timeout_secs,
                    }),
            },
            submitter: config.submitter.clone(),
            monitor: config.monitor.clone(),
            retry: config.retry.clone(),
            rate_limit: config.rate_limit.clone(),
        }
    }
}
