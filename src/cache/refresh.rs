//! Cache Refresh Engine
//!
//! Rebuilds the inactive buffer from the record store and swaps it in.
//!
//! # Safety Guarantees
//!
//! 1. The serving buffer is never written during a run
//! 2. The flag only moves after every batch has been written
//! 3. Any failure or timeout aborts the run with the old buffer still serving
//! 4. At most one run is in flight at a time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::buffers::DualBufferStore;
use super::codec::RecordCodec;
use super::keys;
use super::metrics::CacheMetrics;
use crate::domain::{BufferId, DomainEvent, EventPublisher, KeyValueStore, Person, Pipeline, RecordStore};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the refresh engine
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Records written per pipeline
    pub batch_size: usize,

    /// Maximum batches written concurrently
    pub max_workers: usize,

    /// Bound on fetching and writing all records
    pub timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_workers: 10,
            timeout: Duration::from_secs(10 * 60), // 10 minutes
        }
    }
}

// =============================================================================
// Refresh State Machine
// =============================================================================

/// States in a refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefreshState {
    /// Initial state
    Idle,
    /// Resolving the inactive buffer
    Selecting,
    /// Removing stale keys from the target buffer
    Clearing,
    /// Writing records in batches
    Populating,
    /// Moving the active flag
    Swapping,
    /// Run completed and the target buffer is serving
    Completed,
    /// Run aborted, previous buffer still serving
    Failed,
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "Idle"),
            RefreshState::Selecting => write!(f, "Selecting"),
            RefreshState::Clearing => write!(f, "Clearing"),
            RefreshState::Populating => write!(f, "Populating"),
            RefreshState::Swapping => write!(f, "Swapping"),
            RefreshState::Completed => write!(f, "Completed"),
            RefreshState::Failed => write!(f, "Failed"),
        }
    }
}

/// A step in a refresh run
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStep {
    pub state: RefreshState,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub duration_ms: Option<u64>,
}

/// Result of a refresh run
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Unique run identifier
    pub run_id: String,

    /// Final state
    pub state: RefreshState,

    /// Buffer being rebuilt
    pub target_buffer: Option<BufferId>,

    /// Buffer serving when the run started
    pub previous_buffer: Option<BufferId>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,

    /// Keys removed while clearing
    pub keys_cleared: u64,

    /// Records returned by the record store
    pub records_total: usize,

    /// Records written to the target buffer
    pub records_cached: u64,

    /// Records that failed to serialize
    pub records_skipped: u64,

    /// Pipelines executed
    pub batches: usize,

    /// Error if failed
    pub error: Option<String>,

    /// Step-by-step log
    pub steps: Vec<RefreshStep>,
}

impl RefreshReport {
    /// Check if the run swapped in a fresh buffer
    pub fn is_success(&self) -> bool {
        self.state == RefreshState::Completed
    }

    fn new(run_id: String) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            state: RefreshState::Idle,
            target_buffer: None,
            previous_buffer: None,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            keys_cleared: 0,
            records_total: 0,
            records_cached: 0,
            records_skipped: 0,
            batches: 0,
            error: None,
            steps: vec![],
        }
    }

    /// Record a state transition
    fn transition(&mut self, state: RefreshState, message: &str) {
        let now = Utc::now();
        let last_step_time = self
            .steps
            .last()
            .map(|s| s.timestamp)
            .unwrap_or(self.start_time);
        let duration_ms = (now - last_step_time).num_milliseconds().max(0) as u64;

        self.state = state;
        self.steps.push(RefreshStep {
            state,
            timestamp: now,
            message: message.to_string(),
            duration_ms: Some(duration_ms),
        });

        self.end_time = now;
        self.duration = (now - self.start_time).to_std().unwrap_or(Duration::ZERO);
    }

    /// Mark as failed
    fn fail(&mut self, error: &str) {
        self.transition(RefreshState::Failed, error);
        self.error = Some(error.to_string());
    }
}

// =============================================================================
// Population
// =============================================================================

/// Counts from writing one or more batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub cached: u64,
    pub skipped: u64,
}

/// Split records into consecutive batches of at most `batch_size`.
pub fn into_batches(people: Vec<Person>, batch_size: usize) -> Vec<Vec<Person>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(people.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size.min(people.len()));

    for person in people {
        current.push(person);
        if current.len() == batch_size {
            batches.push(std::mem::replace(
                &mut current,
                Vec::with_capacity(batch_size),
            ));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Write one batch as a single pipeline.
///
/// Each entry is queued before its index additions. Records that fail to
/// encode are skipped and counted.
pub async fn write_batch(
    index: usize,
    region: &dyn KeyValueStore,
    codec: &dyn RecordCodec,
    batch: &[Person],
) -> Result<BatchStats> {
    let mut pipeline = Pipeline::with_capacity(batch.len() * 6);
    let mut stats = BatchStats::default();

    for person in batch {
        let payload = match codec.encode(person) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(person_id = person.id, "Skipping record: {}", e);
                stats.skipped += 1;
                continue;
            }
        };

        let entry = keys::entry_key(person.id, &person.national_id);
        pipeline.set(entry.clone(), payload);
        for index_key in keys::index_keys_for(person) {
            pipeline.set_add(index_key, entry.clone());
        }
        stats.cached += 1;
    }

    if pipeline.is_empty() {
        return Ok(stats);
    }

    let commands = pipeline.len();
    region
        .execute(pipeline)
        .await
        .map_err(|e| Error::BatchFailed {
            batch: index,
            reason: e.to_string(),
        })?;

    debug!(
        "Batch {} wrote {} records ({} commands) to {}",
        index,
        stats.cached,
        commands,
        region.region()
    );
    Ok(stats)
}

// =============================================================================
// Single-Flight Guard
// =============================================================================

struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

// =============================================================================
// Refresh Engine
// =============================================================================

/// Rebuilds and swaps cache buffers
pub struct RefreshEngine {
    config: RefreshConfig,
    buffers: Arc<DualBufferStore>,
    records: Arc<dyn RecordStore>,
    codec: Arc<dyn RecordCodec>,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<CacheMetrics>,
    running: AtomicBool,
    last_report: RwLock<Option<RefreshReport>>,
}

impl RefreshEngine {
    pub fn new(
        config: RefreshConfig,
        buffers: Arc<DualBufferStore>,
        records: Arc<dyn RecordStore>,
        codec: Arc<dyn RecordCodec>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<CacheMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            buffers,
            records,
            codec,
            events,
            metrics,
            running: AtomicBool::new(false),
            last_report: RwLock::new(None),
        })
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Check if a run is in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Report of the most recent finished run
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.last_report.read().clone()
    }

    /// Run one refresh.
    ///
    /// Returns [`Error::RefreshInProgress`] without touching any buffer if
    /// another run is in flight.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Refresh already in progress, skipping trigger");
            self.metrics.record_refresh_skipped();
            self.emit(DomainEvent::refresh_skipped("refresh already in progress"))
                .await;
            return Err(Error::RefreshInProgress);
        };

        let mut report = RefreshReport::new(uuid::Uuid::new_v4().to_string());
        let started = Instant::now();
        info!(run_id = %report.run_id, "Starting cache refresh");

        let outcome = self.run(&mut report).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(()) => {
                self.metrics.record_refresh_success(
                    report.records_cached,
                    report.records_skipped,
                    elapsed,
                );
                info!(
                    run_id = %report.run_id,
                    "Cache refresh completed: {} records cached, {} skipped in {:?}",
                    report.records_cached,
                    report.records_skipped,
                    elapsed
                );
                Ok(report.clone())
            }
            Err(e) => {
                report.fail(&e.to_string());
                self.metrics.record_refresh_failure(elapsed);
                error!(run_id = %report.run_id, "Cache refresh failed: {}", e);
                self.emit(DomainEvent::refresh_failed(
                    report.run_id.clone(),
                    report.target_buffer,
                    e.to_string(),
                ))
                .await;
                Err(e)
            }
        };

        *self.last_report.write() = Some(report);
        result
    }

    async fn run(&self, report: &mut RefreshReport) -> Result<()> {
        let run_id = report.run_id.clone();

        // =====================================================================
        // Phase 1: Select
        // =====================================================================
        report.transition(RefreshState::Selecting, "Resolving inactive buffer");
        let active = self.buffers.active_buffer_id().await?;
        let target = active.other();
        report.previous_buffer = Some(active);
        report.target_buffer = Some(target);
        self.emit(DomainEvent::refresh_started(run_id.clone(), target))
            .await;

        // =====================================================================
        // Phase 2: Clear
        // =====================================================================
        report.transition(RefreshState::Clearing, &format!("Clearing buffer {}", target));
        report.keys_cleared = self.buffers.clear(target).await?;
        self.emit(DomainEvent::buffer_cleared(
            run_id.clone(),
            target,
            report.keys_cleared,
        ))
        .await;

        // =====================================================================
        // Phase 3: Populate
        // =====================================================================
        report.transition(
            RefreshState::Populating,
            &format!("Populating buffer {}", target),
        );
        let populate_started = Instant::now();
        let (total, batches, stats) = timeout(self.config.timeout, self.populate(target))
            .await
            .map_err(|_| Error::RefreshTimeout {
                duration: format!("{:?}", self.config.timeout),
            })??;

        report.records_total = total;
        report.batches = batches;
        report.records_cached = stats.cached;
        report.records_skipped = stats.skipped;
        self.emit(DomainEvent::buffer_populated(
            run_id.clone(),
            target,
            stats.cached,
            stats.skipped,
            batches,
            populate_started.elapsed(),
        ))
        .await;

        // =====================================================================
        // Phase 4: Swap
        // =====================================================================
        report.transition(
            RefreshState::Swapping,
            &format!("Switching active buffer {} -> {}", active, target),
        );
        self.buffers.set_active_buffer_id(target).await?;
        self.emit(DomainEvent::buffer_swapped(run_id, active, target))
            .await;

        report.transition(RefreshState::Completed, "Refresh completed");
        Ok(())
    }

    /// Fetch every record and write it to `target` on a bounded worker pool.
    ///
    /// Returns `(records fetched, batches, stats)`. Dropping the returned
    /// future aborts any outstanding batch writers.
    async fn populate(&self, target: BufferId) -> Result<(usize, usize, BatchStats)> {
        let people = self.records.find_all().await?;
        let total = people.len();
        let region = self.buffers.buffer(target);
        let batches = into_batches(people, self.config.batch_size);
        let batch_count = batches.len();

        info!(
            "Writing {} records to buffer {} in {} batches ({} workers)",
            total, target, batch_count, self.config.max_workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut join_set = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let region = region.clone();
            let codec = self.codec.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Internal(format!("worker pool closed: {}", e)))?;
                write_batch(index, region.as_ref(), codec.as_ref(), &batch).await
            });
        }

        let mut stats = BatchStats::default();
        let mut failures = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(batch_stats)) => {
                    stats.cached += batch_stats.cached;
                    stats.skipped += batch_stats.skipped;
                }
                Ok(Err(e)) => {
                    warn!("{}", e);
                    failures.push(e.to_string());
                }
                Err(e) => {
                    warn!("Batch worker panicked: {}", e);
                    failures.push(format!("worker panicked: {}", e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::PopulationFailed {
                failed: failures.len(),
                total: batch_count,
                reason: failures.join("; "),
            });
        }

        Ok((total, batch_count, stats))
    }

    async fn emit(&self, event: DomainEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.events.publish(event).await {
            warn!("Failed to publish {} event: {}", event_type, e);
        }
    }
}

impl std::fmt::Debug for RefreshEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshEngine")
            .field("config", &self.config)
            .field("buffers", &self.buffers)
            .field("codec", &self.codec)
            .field("running", &self.is_running())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
