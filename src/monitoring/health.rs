//! Health Checks
//!
//! Readiness reporting for the record store, the cache control region and
//! refresh progress.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::cache::CacheMetrics;
use crate::domain::{KeyValueStore, RecordStore};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is degraded but operational
    Degraded,
    /// Service is unhealthy
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy or degraded (operational)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    fn severity(self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl HealthCheckResult {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
            duration_ms: 0,
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            duration_ms: 0,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status among the checks
    pub status: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    pub version: String,
    pub uptime_seconds: u64,
}

impl HealthResponse {
    pub fn new(checks: Vec<HealthCheckResult>, uptime: Duration) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .max_by_key(|s| s.severity())
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            checks,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime.as_secs(),
        }
    }
}

/// Runs the service's dependency checks.
///
/// The record store is critical. The cache control region and refresh
/// progress only degrade the service, since queries can still be answered.
pub struct HealthChecker {
    records: Arc<dyn RecordStore>,
    control: Arc<dyn KeyValueStore>,
    metrics: Arc<CacheMetrics>,
    check_timeout: Duration,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(
        records: Arc<dyn RecordStore>,
        control: Arc<dyn KeyValueStore>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            records,
            control,
            metrics,
            check_timeout: Duration::from_secs(2),
            start_time: Instant::now(),
        }
    }

    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Run all checks concurrently.
    pub async fn check_all(&self) -> HealthResponse {
        let (records, control) =
            futures::future::join(self.check_record_store(), self.check_cache_control()).await;
        let checks = vec![records, control, self.check_refresh()];
        HealthResponse::new(checks, self.uptime())
    }

    async fn check_record_store(&self) -> HealthCheckResult {
        const NAME: &str = "record_store";
        let started = Instant::now();
        let result = match timeout(self.check_timeout, self.records.health_check()).await {
            Ok(Ok(true)) => HealthCheckResult::healthy(NAME),
            Ok(Ok(false)) => HealthCheckResult::unhealthy(NAME, "record store reported unavailable"),
            Ok(Err(e)) => HealthCheckResult::unhealthy(NAME, e.to_string()),
            Err(_) => HealthCheckResult::unhealthy(NAME, "health check timed out"),
        };
        result.with_duration(started.elapsed())
    }

    async fn check_cache_control(&self) -> HealthCheckResult {
        const NAME: &str = "cache_control";
        let started = Instant::now();
        let result = match timeout(self.check_timeout, self.control.ping()).await {
            Ok(Ok(())) => HealthCheckResult::healthy(NAME),
            Ok(Err(e)) => HealthCheckResult::degraded(NAME, e.to_string()),
            Err(_) => HealthCheckResult::degraded(NAME, "ping timed out"),
        };
        result.with_duration(started.elapsed())
    }

    fn check_refresh(&self) -> HealthCheckResult {
        if self.metrics.has_refreshed() {
            HealthCheckResult::healthy("cache_refresh")
        } else {
            HealthCheckResult::degraded("cache_refresh", "no successful refresh yet")
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryKeyValueStore, InMemoryRecordStore};

    fn checker() -> (HealthChecker, Arc<InMemoryRecordStore>, Arc<InMemoryKeyValueStore>, Arc<CacheMetrics>) {
        let records = Arc::new(InMemoryRecordStore::default());
        let control = Arc::new(InMemoryKeyValueStore::new("control"));
        let metrics = Arc::new(CacheMetrics::new());
        let checker = HealthChecker::new(records.clone(), control.clone(), metrics.clone());
        (checker, records, control, metrics)
    }

    #[test]
    fn test_overall_status_is_worst() {
        let response = HealthResponse::new(
            vec![
                HealthCheckResult::healthy("a"),
                HealthCheckResult::degraded("b", "slow"),
            ],
            Duration::from_secs(5),
        );
        assert_eq!(response.status, HealthStatus::Degraded);
        assert!(response.status.is_operational());

        let response = HealthResponse::new(
            vec![
                HealthCheckResult::unhealthy("a", "down"),
                HealthCheckResult::degraded("b", "slow"),
            ],
            Duration::ZERO,
        );
        assert_eq!(response.status, HealthStatus::Unhealthy);
        assert!(!response.status.is_operational());
    }

    #[tokio::test]
    async fn test_degraded_until_first_refresh() {
        let (checker, _, _, metrics) = checker();

        let response = checker.check_all().await;
        assert_eq!(response.status, HealthStatus::Degraded);

        metrics.record_refresh_success(1, 0, Duration::from_millis(5));
        let response = checker.check_all().await;
        assert_eq!(response.status, HealthStatus::Healthy);
        assert_eq!(response.checks.len(), 3);
    }

    #[tokio::test]
    async fn test_cache_outage_degrades() {
        let (checker, _, control, metrics) = checker();
        metrics.record_refresh_success(1, 0, Duration::from_millis(5));
        control.set_available(false);

        let response = checker.check_all().await;
        assert_eq!(response.status, HealthStatus::Degraded);
        let control_check = response.checks.iter().find(|c| c.name == "cache_control").unwrap();
        assert!(control_check.message.as_deref().unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_record_store_outage_is_unhealthy() {
        let (checker, records, _, _) = checker();
        records.set_available(false);

        let response = checker.check_all().await;
        assert_eq!(response.status, HealthStatus::Unhealthy);
    }
}
