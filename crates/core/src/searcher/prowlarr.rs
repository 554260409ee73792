//! Prowlarr search backend implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ProwlarrConfig;
use crate::retry::RetryPolicy;

use super::rate_limiter::RateLimiter;
use super::{Candidate, IndexerHealth, IndexerQuery, SearchError, Searcher};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Prowlarr search backend.
///
/// Every attempt passes through the shared [`RateLimiter`]; transient failures
/// are retried according to the [`RetryPolicy`].
pub struct ProwlarrSearcher {
    client: Client,
    config: ProwlarrConfig,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl ProwlarrSearcher {
    pub fn new(
        config: ProwlarrConfig,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            rate_limiter,
            retry,
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Build the search URL for a query.
    fn build_search_url(&self, query: &IndexerQuery) -> String {
        let mut url = format!(
            "{}/api/v1/search?query={}&type=search",
            self.base_url(),
            urlencoding::encode(&query.query)
        );

        for cat in &query.categories {
            url.push_str(&format!("&categories={}", cat.newznab_id()));
        }
        for id in &query.indexer_ids {
            url.push_str(&format!("&indexerIds={}", id));
        }

        url
    }

    /// One rate-limited request, without retry.
    async fn search_once(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<Candidate>, SearchError> {
        self.rate_limiter.acquire().await?;

        let mut request = self.client.get(url).header(API_KEY_HEADER, &self.config.api_key);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body, retry_after_ms));
        }

        let results: Vec<ProwlarrResult> = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        Ok(results.into_iter().map(ProwlarrResult::into_candidate).collect())
    }
}

#[async_trait]
impl Searcher for ProwlarrSearcher {
    fn name(&self) -> &str {
        "prowlarr"
    }

    async fn search(&self, query: &IndexerQuery) -> Result<Vec<Candidate>, SearchError> {
        let url = self.build_search_url(query);
        debug!(query = %query.query, categories = ?query.categories, "Searching Prowlarr");

        let candidates = self
            .retry
            .run("prowlarr_search", || self.search_once(&url, query.timeout))
            .await?;

        debug!(results = candidates.len(), "Prowlarr search complete");
        Ok(candidates)
    }

    async fn probe(&self) -> IndexerHealth {
        let url = format!("{}/api/v1/health", self.base_url());
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .timeout(Duration::from_secs(self.config.probe_timeout_secs as u64))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                // The health endpoint lists outstanding issues; none means healthy
                match resp.json::<Vec<serde_json::Value>>().await {
                    Ok(issues) if issues.is_empty() => IndexerHealth::Up,
                    Ok(issues) => {
                        debug!(issues = issues.len(), "Prowlarr reports health issues");
                        IndexerHealth::Degraded
                    }
                    Err(_) => IndexerHealth::Degraded,
                }
            }
            Ok(resp) if resp.status().is_server_error() || resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                IndexerHealth::Degraded
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Prowlarr health probe rejected");
                IndexerHealth::Down
            }
            Err(e) => {
                warn!(error = %e, "Prowlarr health probe failed");
                IndexerHealth::Down
            }
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else {
        SearchError::Network(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str, retry_after_ms: Option<u64>) -> SearchError {
    let message = body.chars().take(200).collect::<String>();
    match status.as_u16() {
        401 | 403 => SearchError::Authentication(format!("HTTP {}", status)),
        429 => SearchError::RateLimited {
            retry_after_ms: retry_after_ms.unwrap_or(0),
        },
        code @ 400..=499 => SearchError::Client {
            status: code,
            message,
        },
        code => SearchError::Server {
            status: code,
            message,
        },
    }
}

/// Parse an indexer publish date.
fn parse_publish_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

// Prowlarr API response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProwlarrResult {
    guid: String,
    title: String,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    magnet_url: Option<String>,
    #[serde(default)]
    seeders: Option<i32>,
    #[serde(default)]
    leechers: Option<i32>,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    indexer_id: i32,
}

impl ProwlarrResult {
    fn into_candidate(self) -> Candidate {
        Candidate {
            guid: self.guid,
            title: self.title,
            size_bytes: self.size.unwrap_or(0).max(0) as u64,
            download_url: self.download_url.filter(|u| !u.is_empty()),
            magnet_uri: self.magnet_url.filter(|u| u.starts_with("magnet:")),
            seeders: self.seeders.unwrap_or(0).max(0) as u32,
            leechers: self.leechers.unwrap_or(0).max(0) as u32,
            publish_date: self.publish_date.as_deref().and_then(parse_publish_date),
            indexer_id: self.indexer_id,
        }
    }
}
