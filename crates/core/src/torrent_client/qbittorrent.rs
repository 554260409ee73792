//! qBittorrent Web API v2 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::retry::RetryPolicy;

use super::{AddTorrentRequest, TorrentClient, TorrentClientError, TorrentFilters, TorrentInfo};

/// qBittorrent client implementation.
///
/// Without a username the client assumes a local deployment with auth
/// bypass and never logs in. Otherwise it logs in lazily on first use and
/// again whenever the server answers 403 (expired session).
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    retry: RetryPolicy,
    /// Whether the cookie jar holds a live session.
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig, retry: RetryPolicy) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| {
                TorrentClientError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            retry,
            session: Arc::new(RwLock::new(false)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn requires_login(&self) -> bool {
        self.config
            .username
            .as_deref()
            .is_some_and(|u| !u.is_empty())
    }

    /// Login and let the cookie jar keep the session.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_deref().unwrap_or_default()),
            ("password", self.config.password.as_deref().unwrap_or_default()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() && body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else if status.is_server_error() {
            Err(TorrentClientError::Server {
                status: status.as_u16(),
                message: truncate(&body),
            })
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                truncate(&body)
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if !self.requires_login() || *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send one request with session handling and return the body.
    ///
    /// A 403 on an authenticated deployment drops the session, logs in again
    /// and replays the request once.
    async fn execute<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        self.ensure_authenticated().await?;

        let mut response = build(&self.client)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() == StatusCode::FORBIDDEN && self.requires_login() {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;
            response = build(&self.client)
                .send()
                .await
                .map_err(map_transport_error)?;
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TorrentClientError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        Ok(body)
    }

    fn list_url(&self, filters: &TorrentFilters) -> String {
        let mut url = format!(
            "{}/api/v2/torrents/info?filter={}",
            self.base_url(),
            filters.status.as_str()
        );
        if let Some(category) = &filters.category {
            url.push_str(&format!("&category={}", urlencoding::encode(category)));
        }
        url
    }
}

fn map_transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else {
        TorrentClientError::ConnectionFailed(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> TorrentClientError {
    match status.as_u16() {
        401 | 403 => TorrentClientError::AuthenticationFailed(format!("HTTP {}", status)),
        code @ 400..=499 => TorrentClientError::Client {
            status: code,
            message: truncate(body),
        },
        code => TorrentClientError::Server {
            status: code,
            message: truncate(body),
        },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(100).collect()
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    num_seeds: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            seeders: self.num_seeds.max(0) as u32,
            added_at: timestamp_to_datetime(self.added_on),
            completed_at: timestamp_to_datetime(self.completion_on),
            save_path: Some(self.save_path).filter(|p| !p.is_empty()),
            category: Some(self.category).filter(|c| !c.is_empty()),
        }
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(&self, request: AddTorrentRequest) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/torrents/add", self.base_url());

        let mut params: Vec<(&str, String)> = vec![("urls", request.urls.clone())];
        if let Some(category) = &request.category {
            params.push(("category", category.clone()));
        }

        let body = self
            .retry
            .run("qbittorrent_add", || {
                self.execute(|client| client.post(&url).form(&params))
            })
            .await?;

        // qBittorrent answers 200 "Fails." when it refuses the torrent
        if body.trim() == "Fails." {
            return Err(TorrentClientError::Rejected(
                "qBittorrent refused the torrent".to_string(),
            ));
        }

        debug!(category = ?request.category, "Torrent submitted to qBittorrent");
        Ok(())
    }

    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let url = self.list_url(filters);

        let body = self
            .retry
            .run("qbittorrent_list", || self.execute(|client| client.get(&url)))
            .await?;

        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&body).map_err(|e| {
            TorrentClientError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        Ok(torrents
            .into_iter()
            .map(QBTorrentInfo::into_torrent_info)
            .collect())
    }
}
