use super::{types::Config, ConfigError, SearcherBackend, TorrentClientBackend};

/// Upper bound on automatic replacements per request.
const MAX_RETRIES_LIMIT: u32 = 10;

/// Upper bounds for the transport retry policy.
const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Validate configuration
///
/// Rejects values that parse but cannot work at runtime: zero ports or
/// intervals, a missing backend section, an empty API key, a retry budget
/// above the limit, an unbounded backoff, or a malformed language tag.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    match config.searcher.backend {
        SearcherBackend::Prowlarr => {
            let Some(prowlarr) = &config.searcher.prowlarr else {
                return invalid("searcher.prowlarr section is required when backend = \"prowlarr\"");
            };
            if prowlarr.url.trim().is_empty() {
                return invalid("searcher.prowlarr.url cannot be empty");
            }
            if prowlarr.api_key.trim().is_empty() {
                return invalid("searcher.prowlarr.api_key cannot be empty");
            }
        }
    }

    match config.torrent_client.backend {
        TorrentClientBackend::QBittorrent => {
            let Some(qb) = &config.torrent_client.qbittorrent else {
                return invalid(
                    "torrent_client.qbittorrent section is required when backend = \"qbittorrent\"",
                );
            };
            if qb.url.trim().is_empty() {
                return invalid("torrent_client.qbittorrent.url cannot be empty");
            }
        }
    }

    if let Some(language) = &config.search.language {
        let valid = (2..=3).contains(&language.len())
            && language.chars().all(|c| c.is_ascii_alphabetic());
        if !valid {
            return invalid(&format!(
                "search.language must be 2-3 ASCII letters, got {:?}",
                language
            ));
        }
    }

    if config.monitor.poll_interval_secs == 0 {
        return invalid("monitor.poll_interval_secs cannot be 0");
    }
    if config.monitor.stall_threshold_secs == 0 {
        return invalid("monitor.stall_threshold_secs cannot be 0");
    }
    if config.monitor.max_retries > MAX_RETRIES_LIMIT {
        return invalid(&format!(
            "monitor.max_retries cannot exceed {}",
            MAX_RETRIES_LIMIT
        ));
    }

    if config.retry.max_attempts == 0 || config.retry.max_attempts > MAX_ATTEMPTS_LIMIT {
        return invalid(&format!(
            "retry.max_attempts must be between 1 and {}",
            MAX_ATTEMPTS_LIMIT
        ));
    }
    let multiplier = config.retry.backoff_multiplier;
    if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
        return invalid(&format!(
            "retry.backoff_multiplier must be between 1.0 and {}",
            MAX_BACKOFF_MULTIPLIER
        ));
    }
    if config.retry.initial_delay_ms > config.retry.max_delay_ms {
        return invalid("retry.initial_delay_ms cannot exceed retry.max_delay_ms");
    }

    if config.rate_limit.capacity == 0 {
        return invalid("rate_limit.capacity cannot be 0");
    }

    Ok(())
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}
