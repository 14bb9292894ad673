//! Per-key token bucket limiter for login attempts.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token bucket rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Attempts allowed back to back
    pub burst: u32,
    /// Tokens added per second
    pub refill_per_sec: f64,
    /// Buckets idle this long are dropped by `cleanup_stale`
    pub stale_after_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 5,
            refill_per_sec: 0.1,
            stale_after_secs: 600,
        }
    }
}

impl RateLimitConfig {
    /// Rejects a refill rate that is negative or not finite.
    pub fn validate(&self) -> session_core::Result<()> {
        if !self.refill_per_sec.is_finite() || self.refill_per_sec < 0.0 {
            return Err(session_core::Error::config(format!(
                "rate_limit.refill_per_sec must be a finite non-negative number, got {}",
                self.refill_per_sec
            )));
        }
        Ok(())
    }
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_update: Instant::now(),
        }
    }

    /// Takes a token, or returns how long until one is available.
    fn try_acquire(&mut self, config: &RateLimitConfig) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        let refills = config.refill_per_sec.is_finite() && config.refill_per_sec > 0.0;
        if refills {
            self.tokens = (self.tokens + elapsed * config.refill_per_sec).min(config.burst as f64);
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        let fallback = Duration::from_secs(config.stale_after_secs);
        if !refills {
            return Err(fallback);
        }
        Err(Duration::try_from_secs_f64((1.0 - self.tokens) / config.refill_per_sec)
            .unwrap_or(fallback))
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Consumes one attempt for `key`. On rejection, returns the wait until
    /// the next attempt is allowed.
    pub fn acquire(&self, key: &str) -> Result<(), Duration> {
        let mut buckets = self.buckets.lock();

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst));

        bucket.try_acquire(&self.config)
    }

    /// Drops buckets idle for longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }

    /// Drops buckets idle for longer than the configured staleness.
    pub fn cleanup_stale(&self) {
        self.cleanup(Duration::from_secs(self.config.stale_after_secs));
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;
