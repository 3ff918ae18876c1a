//! Domain Layer
//!
//! # Architecture
//!
//! - **Model** (`model.rs`) - The person record and its address
//! - **Ports** (`ports.rs`) - Trait abstractions for external dependencies
//! - **Events** (`events.rs`) - Refresh lifecycle events
//!
//! # Usage
//!
//! ```ignore
//! use people_cache::domain::ports::{KeyValueStore, RecordStore};
//!
//! async fn warm<R, K>(records: &R, buffer: &K) -> Result<()>
//! where
//!     R: RecordStore,
//!     K: KeyValueStore,
//! {
//!     let people = records.find_all().await?;
//!     // ...
//! }
//! ```

pub mod events;
pub mod model;
pub mod ports;

// Re-export commonly used types
pub use events::DomainEvent;
pub use model::{Address, Person};
pub use ports::{
    BufferId, Command, EventPublisher, KeyValueStore, PeopleQuery, Pipeline, RecordStore, Reply,
    ScanPage,
};
