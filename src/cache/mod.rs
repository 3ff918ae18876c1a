//! Double-Buffered People Cache
//!
//! Read-optimized copy of the person dataset held in two key-value buffers,
//! rebuilt periodically from the record store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Refresh Scheduler (cron)                         │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  Refresh Engine                                                           │
//! │  select inactive ─▶ clear ─▶ populate (JoinSet + Semaphore) ─▶ swap flag  │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  Dual-Buffer Store     control: cache:activeDb                            │
//! │                        buffer 1 │ buffer 2                                │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  Query Facade          index set ─▶ multi-get ─▶ decode ─▶ sort by id     │
//! │                        miss/error ─▶ fallback | degrade                   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - Readers never observe a half-built buffer
//! - The flag write is the only cross-buffer synchronization point
//! - Cache-internal errors never reach query callers

pub mod buffers;
pub mod codec;
pub mod keys;
pub mod metrics;
pub mod query;
pub mod refresh;
pub mod scheduler;

#[cfg(test)]
mod proptest;

pub use buffers::{BufferConfig, DualBufferStore, ACTIVE_BUFFER_KEY};
pub use codec::{JsonRecordCodec, RecordCodec};
pub use keys::QueryDimension;
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use query::{CacheLookup, CacheReader, DegradingPeopleQuery, FallbackPeopleQuery};
pub use refresh::{RefreshConfig, RefreshEngine, RefreshReport, RefreshState};
pub use scheduler::{RefreshScheduler, SchedulerConfig};
