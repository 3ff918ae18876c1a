//! Observability
//!
//! Health reporting and Prometheus exposition for the cache service.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  CacheMetrics (atomics, shared with query + refresh)          │
//! └──────────────┬─────────────────────────────┬─────────────────┘
//!                ▼                             ▼
//!      ┌──────────────────┐          ┌──────────────────────┐
//!      │ MetricsExporter  │          │ HealthChecker        │
//!      │ (/metrics)       │          │ (/readyz)            │
//!      └──────────────────┘          └──────────────────────┘
//! ```

mod exporter;
mod health;

pub use exporter::MetricsExporter;
pub use health::{HealthCheckResult, HealthChecker, HealthResponse, HealthStatus};
