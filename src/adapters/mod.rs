//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  KeyValueStore │ RecordStore │ EventPublisher              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemoryKeyValueStore │ RedisKeyValueStore (feature)       │ │
//! │  │ InMemoryRecordStore   │ LoggingEventPublisher              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use people_cache::adapters::{InMemoryKeyValueStore, InMemoryRecordStore};
//! use people_cache::cache::DualBufferStore;
//!
//! let buffers = DualBufferStore::new(
//!     Arc::new(InMemoryKeyValueStore::new("control")),
//!     Arc::new(InMemoryKeyValueStore::new("buffer-1")),
//!     Arc::new(InMemoryKeyValueStore::new("buffer-2")),
//! );
//! let records = InMemoryRecordStore::from_file("data/people.yaml")?;
//! ```

mod event_publisher;
mod memory_kv;
mod memory_records;
#[cfg(feature = "redis")]
mod redis_kv;

pub use event_publisher::{CompositeEventPublisher, InMemoryEventCollector, LoggingEventPublisher};
pub use memory_kv::{glob_match, InMemoryKeyValueStore, InMemoryStoreStats, MAX_OPEN_CURSORS};
pub use memory_records::InMemoryRecordStore;
#[cfg(feature = "redis")]
pub use redis_kv::{region_url, RedisKeyValueStore};
