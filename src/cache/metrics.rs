//! Cache Metrics Collection
//!
//! Lookup and refresh counters shared by the query facade, the refresh
//! engine and the Prometheus exporter.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Lookup metrics
    hits: AtomicU64,
    misses: AtomicU64,
    cache_errors: AtomicU64,
    fallbacks: AtomicU64,
    degraded_responses: AtomicU64,
    decode_failures: AtomicU64,

    // Refresh metrics
    refresh_runs: AtomicU64,
    refresh_failures: AtomicU64,
    refresh_skips: AtomicU64,
    last_records_cached: AtomicU64,
    last_records_skipped: AtomicU64,
    last_refresh_duration_ms: AtomicU64,
    last_success_unix: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    // Lookups
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failures(&self, count: u64) {
        self.decode_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    // Refresh runs
    pub fn record_refresh_success(&self, cached: u64, skipped: u64, duration: Duration) {
        self.refresh_runs.fetch_add(1, Ordering::Relaxed);
        self.last_records_cached.store(cached, Ordering::Relaxed);
        self.last_records_skipped.store(skipped, Ordering::Relaxed);
        self.last_refresh_duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
        self.last_success_unix
            .store(chrono::Utc::now().timestamp().max(0) as u64, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self, duration: Duration) {
        self.refresh_runs.fetch_add(1, Ordering::Relaxed);
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        self.last_refresh_duration_ms
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_refresh_skipped(&self) {
        self.refresh_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether any refresh run has completed successfully.
    pub fn has_refreshed(&self) -> bool {
        self.last_success_unix.load(Ordering::Relaxed) > 0
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            degraded_responses: self.degraded_responses.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            refresh_runs: self.refresh_runs.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            refresh_skips: self.refresh_skips.load(Ordering::Relaxed),
            last_records_cached: self.last_records_cached.load(Ordering::Relaxed),
            last_records_skipped: self.last_records_skipped.load(Ordering::Relaxed),
            last_refresh_duration_ms: self.last_refresh_duration_ms.load(Ordering::Relaxed),
            last_success_unix: self.last_success_unix.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`CacheMetrics`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    pub cache_errors: u64,
    pub fallbacks: u64,
    pub degraded_responses: u64,
    pub decode_failures: u64,
    pub refresh_runs: u64,
    pub refresh_failures: u64,
    pub refresh_skips: u64,
    pub last_records_cached: u64,
    pub last_records_skipped: u64,
    pub last_refresh_duration_ms: u64,
    /// Unix seconds of the last successful refresh; 0 if none
    pub last_success_unix: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.hit_ratio(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert_eq!(metrics.hit_ratio(), 0.75);
    }

    #[test]
    fn test_refresh_counters() {
        let metrics = CacheMetrics::new();
        assert!(!metrics.has_refreshed());

        metrics.record_refresh_failure(Duration::from_millis(20));
        assert!(!metrics.has_refreshed());

        metrics.record_refresh_success(250, 2, Duration::from_millis(1200));
        metrics.record_refresh_skipped();

        let snapshot = metrics.snapshot();
        assert!(metrics.has_refreshed());
        assert_eq!(snapshot.refresh_runs, 2);
        assert_eq!(snapshot.refresh_failures, 1);
        assert_eq!(snapshot.refresh_skips, 1);
        assert_eq!(snapshot.last_records_cached, 250);
        assert_eq!(snapshot.last_records_skipped, 2);
        assert_eq!(snapshot.last_refresh_duration_ms, 1200);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = CacheMetrics::new();
        metrics.record_decode_failures(3);
        metrics.record_fallback();

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["decode_failures"], 3);
        assert_eq!(json["fallbacks"], 1);
    }
}
