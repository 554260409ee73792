pub mod acquisition;
pub mod config;
pub mod interpreter;
pub mod monitor;
pub mod retry;
pub mod searcher;
pub mod submitter;
pub mod testing;
pub mod torrent_client;

pub use acquisition::{AcquisitionError, AcquisitionOutcome, AcquisitionReply, AcquisitionService};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ProwlarrConfig,
    QBittorrentConfig, SanitizedConfig, SearcherBackend, TorrentClientBackend,
};
pub use interpreter::{parse, AcquisitionRequest, Intent, ParsedInput};
pub use monitor::{
    event_channel, DownloadMonitor, DownloadPhase, DownloadStore, EventEnvelope, EventHandle,
    Failover, MonitorConfig, MonitorError, MonitorEvent, MonitorStatus, TickReport,
    TrackedDownload,
};
pub use retry::{RetryConfig, RetryPolicy, Retryable};
pub use searcher::{
    Candidate, FormatPreference, FormatTier, IndexerHealth, ProwlarrSearcher, RateLimiter,
    SearchEngine, SearchError, SearchOptions, SearchPreferences, SearchResult, Searcher,
};
pub use submitter::{SubmitError, SubmitOutcome, Submitter, SubmitterConfig};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError, TorrentInfo};
