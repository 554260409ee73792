//! Testing utilities and mock implementations.
//!
//! Mocks for the two external services (indexer aggregation and download
//! client) so the whole pipeline can be exercised without real
//! infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelfhound_core::testing::{fixtures, MockSearcher, MockTorrentClient};
//!
//! let searcher = MockSearcher::new();
//! let client = MockTorrentClient::new();
//!
//! searcher.set_results(vec![fixtures::candidate("Dune [M4B]", 12)]).await;
//! client.set_progress("hash", 0.5).await;
//! ```

mod mock_searcher;
mod mock_torrent_client;

pub use mock_searcher::MockSearcher;
pub use mock_torrent_client::MockTorrentClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::Candidate;
    use crate::torrent_client::TorrentInfo;

    /// Stable fake info hash derived from a title (FNV-1a, hex).
    pub fn hash_for(title: &str) -> String {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in title.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        format!("{:016x}", hash)
    }

    pub fn magnet(hash: &str, name: &str) -> String {
        format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            hash,
            urlencoding::encode(name)
        )
    }

    /// A candidate with a magnet locator whose hash is [`hash_for`] the title.
    pub fn candidate(title: &str, seeders: u32) -> Candidate {
        candidate_with_hash(title, seeders, &hash_for(title))
    }

    pub fn candidate_with_hash(title: &str, seeders: u32, hash: &str) -> Candidate {
        Candidate {
            guid: format!("guid-{}", hash),
            title: title.to_string(),
            size_bytes: 300 * 1024 * 1024,
            download_url: Some(format!("http://indexer.local/dl/{}.torrent", hash)),
            magnet_uri: Some(magnet(hash, title)),
            seeders,
            leechers: 1,
            publish_date: None,
            indexer_id: 1,
        }
    }

    /// A download client item.
    pub fn torrent_info(hash: &str, name: &str, progress: f64) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: name.to_string(),
            progress,
            size_bytes: 300 * 1024 * 1024,
            seeders: 4,
            added_at: None,
            completed_at: None,
            save_path: Some("/downloads".to_string()),
            category: Some("audiobooks".to_string()),
        }
    }
}
