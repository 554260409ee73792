//! Indexer search.
//!
//! A [`Searcher`] talks to the indexer aggregation service (Prowlarr). The
//! [`SearchEngine`] sits on top of it and turns raw releases into a filtered,
//! seeder-ranked, format-tiered [`SearchResult`].

mod engine;
mod prowlarr;
mod rate_limiter;
mod types;

pub use engine::{compose_query, select_tier, SearchEngine};
pub use prowlarr::ProwlarrSearcher;
pub use rate_limiter::{RateLimitConfig, RateLimiter, TokenBucket};
pub use types::*;
