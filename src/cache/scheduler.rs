//! Refresh Scheduler
//!
//! Drives the refresh engine from a cron expression with a seconds field,
//! e.g. `0 */5 * * * *` for every five minutes.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::refresh::RefreshEngine;
use crate::error::{Error, Result};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cron expression (seconds field first)
    pub cron: String,

    /// Run one refresh immediately on start
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 */5 * * * *".to_string(),
            run_on_start: true,
        }
    }
}

/// Parse a cron expression.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression).map_err(|e| Error::Schedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Fires refresh runs on a cron schedule until cancelled
pub struct RefreshScheduler {
    engine: Arc<RefreshEngine>,
    schedule: Schedule,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl RefreshScheduler {
    pub fn new(
        engine: Arc<RefreshEngine>,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let schedule = parse_schedule(&config.cron)?;
        Ok(Self {
            engine,
            schedule,
            config,
            shutdown,
        })
    }

    /// Next fire time strictly after `now`.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(self) {
        info!("Starting refresh scheduler with {:?}", self.config);

        if self.config.run_on_start {
            self.trigger().await;
        }

        loop {
            let now = Utc::now();
            let Some(next) = self.next_fire(now) else {
                warn!("Refresh schedule '{}' has no upcoming fire time", self.config.cron);
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next cache refresh at {} (in {:?})", next, wait);

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => self.trigger().await,
            }
        }

        info!("Refresh scheduler shutting down");
    }

    async fn trigger(&self) {
        match self.engine.refresh().await {
            Ok(report) => debug!(run_id = %report.run_id, "Scheduled refresh finished"),
            Err(Error::RefreshInProgress) => {}
            Err(e) => error!("Scheduled refresh failed: {}", e),
        }
    }
}
