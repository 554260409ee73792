use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfhound_core::{
    event_channel, load_config, validate_config, AcquisitionService, DownloadMonitor,
    DownloadStore, Failover, ProwlarrSearcher, QBittorrentClient, RateLimiter, RetryPolicy,
    SearchEngine, Searcher, SearcherBackend, Submitter, TorrentClient, TorrentClientBackend,
};
use shelfhound_server::{api::create_router, notifier::Notifier, state::AppState};

/// Buffer size for the monitor event channel
const EVENT_BUFFER_SIZE: usize = 256;

/// How long to wait for queued notifications on shutdown
const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SHELFHOUND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");

    let retry = RetryPolicy::new(&config.retry);

    // Searcher
    let searcher: Arc<dyn Searcher> = match config.searcher.backend {
        SearcherBackend::Prowlarr => {
            let prowlarr = config
                .searcher
                .prowlarr
                .clone()
                .context("Prowlarr backend selected but no prowlarr config provided")?;
            info!("Initializing Prowlarr searcher at {}", prowlarr.url);
            let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
            Arc::new(
                ProwlarrSearcher::new(prowlarr, limiter, retry.clone())
                    .context("Failed to create Prowlarr searcher")?,
            )
        }
    };

    // Download client
    let (torrent_client, category): (Arc<dyn TorrentClient>, Option<String>) =
        match config.torrent_client.backend {
            TorrentClientBackend::QBittorrent => {
                let qbit = config
                    .torrent_client
                    .qbittorrent
                    .clone()
                    .context("qBittorrent backend selected but no qbittorrent config provided")?;
                info!("Initializing qBittorrent client at {}", qbit.url);
                let category = qbit.category.clone();
                let client: Arc<dyn TorrentClient> = Arc::new(
                    QBittorrentClient::new(qbit, retry.clone())
                        .context("Failed to create qBittorrent client")?,
                );
                (client, category)
            }
        };

    let health = searcher.probe().await;
    info!(backend = searcher.name(), ?health, "Indexer health");

    let engine = Arc::new(SearchEngine::new(searcher));
    let submitter = Arc::new(Submitter::new(
        Arc::clone(&torrent_client),
        &config.submitter,
        category,
    ));

    // Notifications
    let (events, event_rx) = event_channel(EVENT_BUFFER_SIZE);
    let notifier_handle = tokio::spawn(Notifier::new(event_rx).run());

    // Monitor
    let monitor = Arc::new(DownloadMonitor::new(
        config.monitor.clone(),
        torrent_client,
        Failover::new(
            Arc::clone(&engine),
            Arc::clone(&submitter),
            config.search.clone(),
        ),
        DownloadStore::new(),
        events,
    ));
    monitor.start();

    let service = Arc::new(AcquisitionService::new(
        engine,
        submitter,
        Arc::clone(&monitor),
        config.search.clone(),
    ));

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), service));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping download monitor...");
    monitor.stop();
    drop(monitor);

    // The notifier exits once the monitor task drops the last event sender.
    if tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, notifier_handle)
        .await
        .is_err()
    {
        warn!("Notifier did not drain in time");
    }
    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
