//! Token bucket rate limiter shared by all indexer queries.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::SearchError;

/// Rate limiter configuration (`[rate_limit]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Burst size: how many queries may be issued back to back.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Tokens added back per minute.
    #[serde(default = "default_refill_per_minute")]
    pub refill_per_minute: u32,
    /// Longest a caller waits for a token before giving up.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

fn default_capacity() -> u32 {
    10
}

fn default_refill_per_minute() -> u32 {
    30
}

fn default_max_wait_ms() -> u64 {
    5_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_minute: default_refill_per_minute(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// Token bucket.
///
/// Tokens are added at a constant rate and consumed one per request. The
/// bucket starts full, allowing a burst up to the capacity.
pub struct TokenBucket {
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_minute: u32) -> Self {
        let capacity = capacity as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: refill_per_minute as f32 / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to take a token.
    ///
    /// Returns `Err(wait)` with the time until one token is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else if self.refill_rate <= 0.0 {
            Err(Duration::MAX)
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Shared limiter in front of the indexer aggregation service.
///
/// Callers over budget sleep until a token frees up, as long as the wait fits
/// within `max_wait`; otherwise they get [`SearchError::RateLimited`].
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    max_wait: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.capacity, config.refill_per_minute)),
            max_wait: Duration::from_millis(config.max_wait_ms),
        }
    }

    /// Wait for a token, up to the configured maximum.
    pub async fn acquire(&self) -> Result<(), SearchError> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let wait = match self.bucket.lock().await.try_acquire() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            if wait > deadline.saturating_duration_since(Instant::now()) {
                return Err(SearchError::RateLimited {
                    retry_after_ms: wait.as_millis().min(u64::MAX as u128) as u64,
                });
            }
            debug!(wait_ms = wait.as_millis() as u64, "Indexer rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10, 60);
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert!((bucket.refill_rate - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_token_bucket_burst_then_empty() {
        let mut bucket = TokenBucket::new(3, 60);
        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        let wait = bucket.try_acquire().unwrap_err();
        assert!(wait.as_millis() > 0);
        assert!(wait.as_secs() <= 1);
    }

    #[test]
    fn test_token_bucket_without_refill_never_recovers() {
        let mut bucket = TokenBucket::new(1, 0);
        assert!(bucket.try_acquire().is_ok());
        assert_eq!(bucket.try_acquire().unwrap_err(), Duration::MAX);
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(60, 60);
        for _ in 0..60 {
            bucket.try_acquire().unwrap();
        }
        sleep(Duration::from_millis(100)).await;
        bucket.refill();
        assert!(bucket.tokens > 0.05);
        assert!(bucket.tokens < 0.5);
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_token() {
        // 600/min refills one token every 100ms
        let limiter = RateLimiter::new(&RateLimitConfig {
            capacity: 1,
            refill_per_minute: 600,
            max_wait_ms: 1_000,
        });

        limiter.acquire().await.unwrap();
        let started = std::time::Instant::now();
        limiter.acquire().await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_rate_limiter_gives_up_past_max_wait() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            capacity: 1,
            refill_per_minute: 1,
            max_wait_ms: 10,
        });

        limiter.acquire().await.unwrap();
        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimited { .. }));
    }
}
