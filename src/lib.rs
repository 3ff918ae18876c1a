//! People Cache - Double-Buffered Read Cache
//!
//! Serves the people dataset out of a key-value cache that is rebuilt on a
//! schedule. Two buffers alternate: while one answers queries, the other is
//! cleared and repopulated from the authoritative record store, then a
//! single control flag flips readers over.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────┐
//!   cron ───────▶│  RefreshEngine   │── find_all ──▶ RecordStore
//!                └────────┬─────────┘
//!                         │ clear / populate / swap
//!                         ▼
//!   ┌───────────┐   ┌───────────┐   ┌───────────┐
//!   │  control  │   │ buffer 1  │   │ buffer 2  │
//!   │ activeDb  │   │  indexes  │   │  indexes  │
//!   └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!         └───────────────┼───────────────┘
//!                         ▼
//!                ┌──────────────────┐
//!   HTTP ───────▶│   PeopleQuery    │── miss ──▶ RecordStore (strategy)
//!                └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory and Redis implementations of the ports
//! - [`api`] - HTTP routes and server
//! - [`cache`] - Keys, codec, buffers, refresh, query facade
//! - [`config`] - Command-line value types and duration parsing
//! - [`domain`] - Records, ports and refresh events
//! - [`error`] - Error types
//! - [`monitoring`] - Health checks and Prometheus exposition

pub mod adapters;
pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod monitoring;

// Re-export commonly used types
pub use cache::{DualBufferStore, RefreshEngine, RefreshReport};
pub use domain::{Person, PeopleQuery};
pub use error::{Error, Result};
