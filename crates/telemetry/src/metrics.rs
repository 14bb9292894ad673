//! In-process session metrics.
//!
//! Counters are process-global and only ever read through snapshots, which
//! the mock auth service logs and tests assert on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the session guard.
#[derive(Debug, Default)]
pub struct Metrics {
    // Activity monitor
    pub activity_events: Counter,
    pub activity_writes: Counter,
    pub activity_write_failures: Counter,
    pub monitors_mounted: Gauge,

    // Secure session
    pub validations: Counter,
    pub validation_failures: Counter,
    pub forced_sign_outs: Counter,
    pub refreshes: Counter,
    pub refresh_failures: Counter,

    // Mock auth service
    pub mock_logins: Counter,
    pub mock_login_failures: Counter,
    pub rate_limited_requests: Counter,
    pub active_tokens: Gauge,

    // Latency histograms
    pub provider_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub activity_events: u64,
    pub activity_writes: u64,
    pub activity_write_failures: u64,
    pub monitors_mounted: u64,
    pub validations: u64,
    pub validation_failures: u64,
    pub forced_sign_outs: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
    pub mock_logins: u64,
    pub mock_login_failures: u64,
    pub rate_limited_requests: u64,
    pub active_tokens: u64,
    pub provider_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            activity_events: self.activity_events.get(),
            activity_writes: self.activity_writes.get(),
            activity_write_failures: self.activity_write_failures.get(),
            monitors_mounted: self.monitors_mounted.get(),
            validations: self.validations.get(),
            validation_failures: self.validation_failures.get(),
            forced_sign_outs: self.forced_sign_outs.get(),
            refreshes: self.refreshes.get(),
            refresh_failures: self.refresh_failures.get(),
            mock_logins: self.mock_logins.get(),
            mock_login_failures: self.mock_login_failures.get(),
            rate_limited_requests: self.rate_limited_requests.get(),
            active_tokens: self.active_tokens.get(),
            provider_latency_mean_ms: self.provider_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
