//! Prometheus Exporter
//!
//! Mirrors [`CacheMetrics`] into a private `prometheus` registry and renders
//! it in the text exposition format.

use std::sync::Arc;

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use crate::cache::CacheMetrics;
use crate::domain::BufferId;
use crate::error::{Error, Result};

const NAMESPACE: &str = "people_cache";

fn prom_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("prometheus: {}", e))
}

struct Counters {
    hits: IntCounter,
    misses: IntCounter,
    cache_errors: IntCounter,
    fallbacks: IntCounter,
    degraded: IntCounter,
    decode_failures: IntCounter,
    refresh_runs: IntCounter,
    refresh_failures: IntCounter,
    refresh_skips: IntCounter,
}

struct Gauges {
    hit_ratio: Gauge,
    records_cached: IntGauge,
    records_skipped: IntGauge,
    refresh_duration_seconds: Gauge,
    last_success: IntGauge,
    active_buffer: IntGauge,
    cached_entries: IntGauge,
}

/// Renders cache metrics for `/metrics`.
pub struct MetricsExporter {
    metrics: Arc<CacheMetrics>,
    registry: Registry,
    counters: Counters,
    gauges: Gauges,
}

impl MetricsExporter {
    pub fn new(metrics: Arc<CacheMetrics>) -> Result<Self> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None).map_err(prom_err)?;

        let counter = |name: &str, help: &str| -> Result<IntCounter> {
            let c = IntCounter::new(name, help).map_err(prom_err)?;
            registry.register(Box::new(c.clone())).map_err(prom_err)?;
            Ok(c)
        };
        let counters = Counters {
            hits: counter("lookup_hits_total", "Lookups answered from the cache")?,
            misses: counter("lookup_misses_total", "Lookups whose index was empty")?,
            cache_errors: counter("lookup_errors_total", "Lookups that hit a cache store error")?,
            fallbacks: counter("fallbacks_total", "Lookups answered by the record store")?,
            degraded: counter("degraded_responses_total", "Lookups answered with an empty result")?,
            decode_failures: counter("decode_failures_total", "Cache entries skipped while decoding")?,
            refresh_runs: counter("refresh_runs_total", "Refresh runs started")?,
            refresh_failures: counter("refresh_failures_total", "Refresh runs that aborted")?,
            refresh_skips: counter("refresh_skips_total", "Refresh triggers rejected while a run was in flight")?,
        };

        let hit_ratio = Gauge::new("hit_ratio", "Cache hit ratio (0.0 - 1.0)").map_err(prom_err)?;
        registry.register(Box::new(hit_ratio.clone())).map_err(prom_err)?;
        let refresh_duration_seconds =
            Gauge::new("last_refresh_duration_seconds", "Duration of the last refresh run")
                .map_err(prom_err)?;
        registry
            .register(Box::new(refresh_duration_seconds.clone()))
            .map_err(prom_err)?;

        let int_gauge = |name: &str, help: &str| -> Result<IntGauge> {
            let g = IntGauge::new(name, help).map_err(prom_err)?;
            registry.register(Box::new(g.clone())).map_err(prom_err)?;
            Ok(g)
        };
        let gauges = Gauges {
            hit_ratio,
            records_cached: int_gauge("last_records_cached", "Records written by the last successful refresh")?,
            records_skipped: int_gauge("last_records_skipped", "Records skipped by the last successful refresh")?,
            refresh_duration_seconds,
            last_success: int_gauge(
                "last_success_timestamp_seconds",
                "Unix time of the last successful refresh",
            )?,
            active_buffer: int_gauge("active_buffer", "Buffer currently serving reads (0 if unknown)")?,
            cached_entries: int_gauge("cached_entries", "People indexed in the active buffer")?,
        };

        Ok(Self {
            metrics,
            registry,
            counters,
            gauges,
        })
    }

    /// Content type of [`MetricsExporter::render`] output.
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Sync from the latest snapshot and encode.
    ///
    /// `active_buffer` and `cached_entries` are read from the cache regions
    /// by the caller; `None` renders as 0.
    pub fn render(
        &self,
        active_buffer: Option<BufferId>,
        cached_entries: Option<usize>,
    ) -> Result<Vec<u8>> {
        let snapshot = self.metrics.snapshot();

        let sync = |counter: &IntCounter, value: u64| {
            counter.inc_by(value.saturating_sub(counter.get()));
        };
        let c = &self.counters;
        sync(&c.hits, snapshot.hits);
        sync(&c.misses, snapshot.misses);
        sync(&c.cache_errors, snapshot.cache_errors);
        sync(&c.fallbacks, snapshot.fallbacks);
        sync(&c.degraded, snapshot.degraded_responses);
        sync(&c.decode_failures, snapshot.decode_failures);
        sync(&c.refresh_runs, snapshot.refresh_runs);
        sync(&c.refresh_failures, snapshot.refresh_failures);
        sync(&c.refresh_skips, snapshot.refresh_skips);

        let g = &self.gauges;
        g.hit_ratio.set(snapshot.hit_ratio);
        g.records_cached.set(snapshot.last_records_cached as i64);
        g.records_skipped.set(snapshot.last_records_skipped as i64);
        g.refresh_duration_seconds
            .set(snapshot.last_refresh_duration_ms as f64 / 1000.0);
        g.last_success.set(snapshot.last_success_unix as i64);
        g.active_buffer.set(match active_buffer {
            Some(BufferId::One) => 1,
            Some(BufferId::Two) => 2,
            None => 0,
        });
        g.cached_entries.set(cached_entries.unwrap_or(0) as i64);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(prom_err)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_render_reflects_snapshot() {
        let metrics = Arc::new(CacheMetrics::new());
        let exporter = MetricsExporter::new(metrics.clone()).unwrap();

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_refresh_success(42, 1, Duration::from_millis(1500));

        let text = String::from_utf8(exporter.render(Some(BufferId::Two), Some(6)).unwrap()).unwrap();
        assert!(text.contains("people_cache_lookup_hits_total 2"));
        assert!(text.contains("people_cache_lookup_misses_total 1"));
        assert!(text.contains("people_cache_last_records_cached 42"));
        assert!(text.contains("people_cache_active_buffer 2"));
        assert!(text.contains("people_cache_cached_entries 6"));
        assert!(text.contains("people_cache_last_refresh_duration_seconds 1.5"));
    }

    #[test]
    fn test_counters_stay_in_sync_across_renders() {
        let metrics = Arc::new(CacheMetrics::new());
        let exporter = MetricsExporter::new(metrics.clone()).unwrap();

        metrics.record_fallback();
        exporter.render(None, None).unwrap();
        metrics.record_fallback();
        metrics.record_fallback();

        let text = String::from_utf8(exporter.render(None, None).unwrap()).unwrap();
        assert!(text.contains("people_cache_fallbacks_total 3"));
        assert!(text.contains("people_cache_active_buffer 0"));
        assert!(text.contains("people_cache_cached_entries 0"));
    }
}
