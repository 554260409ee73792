//! Common test utilities for server integration tests.
//!
//! The router is driven in-process with `oneshot`; the indexer and the
//! download client are mocks.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use shelfhound_core::{
    event_channel, load_config_from_str,
    testing::{MockSearcher, MockTorrentClient},
    AcquisitionService, Config, DownloadMonitor, DownloadStore, EventEnvelope, Failover,
    SearchEngine, Submitter, SubmitterConfig,
};
use shelfhound_server::{api::create_router, state::AppState};

pub const TEST_CONFIG: &str = r#"
[server]
port = 8080

[searcher]
backend = "prowlarr"

[searcher.prowlarr]
url = "http://prowlarr.local:9696"
api_key = "super-secret-key"

[torrent_client]
backend = "qbittorrent"

[torrent_client.qbittorrent]
url = "http://qbittorrent.local:8080"
username = "admin"
password = "hunter2"
"#;

/// Test response with status and parsed JSON body.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub raw: String,
}

/// In-process server with mocked backends.
pub struct TestFixture {
    pub router: Router,
    pub searcher: Arc<MockSearcher>,
    pub client: Arc<MockTorrentClient>,
    pub monitor: Arc<DownloadMonitor>,
    pub events: mpsc::Receiver<EventEnvelope>,
}

impl TestFixture {
    pub fn new() -> Self {
        let config = load_config_from_str(TEST_CONFIG).expect("test config must parse");
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let searcher = Arc::new(MockSearcher::new());
        let client = Arc::new(MockTorrentClient::new());

        let engine = Arc::new(SearchEngine::new(searcher.clone()));
        let submitter = Arc::new(Submitter::new(
            client.clone(),
            &SubmitterConfig { settle_delay_ms: 0 },
            Some("audiobooks".to_string()),
        ));

        let (handle, events) = event_channel(64);
        let monitor = Arc::new(DownloadMonitor::new(
            config.monitor.clone(),
            client.clone(),
            Failover::new(engine.clone(), submitter.clone(), config.search.clone()),
            DownloadStore::new(),
            handle,
        ));

        let service = Arc::new(AcquisitionService::new(
            engine,
            submitter,
            monitor.clone(),
            config.search.clone(),
        ));
        let state = Arc::new(AppState::new(config, service));

        Self {
            router: create_router(state),
            searcher,
            client,
            monitor,
            events,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let response = self
            .router
            .clone()
            .oneshot(request_builder.body(body).unwrap())
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let raw = String::from_utf8_lossy(&body_bytes).into_owned();
        let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, raw }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.raw
        );
    };
}
