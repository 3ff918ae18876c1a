//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the cache core depends on.
//! Infrastructure adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  RecordStore │ KeyValueStore │ PeopleQuery │ Events │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  InMemoryRecordStore │ InMemoryKeyValueStore │ Redis │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;

use super::model::Person;
use crate::error::{Error, Result};

// =============================================================================
// Value Objects
// =============================================================================

/// Identifier of one of the two interchangeable cache buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BufferId {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl BufferId {
    /// The other buffer.
    pub fn other(self) -> Self {
        match self {
            BufferId::One => BufferId::Two,
            BufferId::Two => BufferId::One,
        }
    }

    /// Flag value stored in the control region.
    pub fn as_str(self) -> &'static str {
        match self {
            BufferId::One => "1",
            BufferId::Two => "2",
        }
    }

    /// Parse a flag value read from the control region.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "1" => Ok(BufferId::One),
            "2" => Ok(BufferId::Two),
            other => Err(Error::InvalidBufferFlag(other.to_string())),
        }
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Key-Value Store Port
// =============================================================================

/// A command queued on a [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Store a string value
    Set { key: String, value: Bytes },
    /// Add a member to a named set
    SetAdd { key: String, member: String },
    /// Fetch many string values at once
    MultiGet { keys: Vec<String> },
    /// Remove keys
    Delete { keys: Vec<String> },
}

/// Reply to a pipelined command, in queue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Command acknowledged
    Ok,
    /// Number of elements affected
    Count(u64),
    /// Values of a multi-get; `None` where the key is absent
    Values(Vec<Option<Bytes>>),
}

/// Batch of commands executed in one round trip.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Bytes) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value,
        });
        self
    }

    pub fn set_add(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn multi_get(&mut self, keys: Vec<String>) -> &mut Self {
        self.commands.push(Command::MultiGet { keys });
        self
    }

    pub fn delete(&mut self, keys: Vec<String>) -> &mut Self {
        self.commands.push(Command::Delete { keys });
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// One page of an incremental key-space scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    /// Cursor to pass to the next call; `0` once the scan is complete
    pub cursor: u64,
    /// Keys matched on this page
    pub keys: Vec<String>,
}

/// Port for one logical key-value region (control, buffer 1 or buffer 2).
///
/// Mirrors the subset of Redis the cache needs: strings, sets, cursor scans
/// and pipelined execution.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Region name, used in logs and errors.
    fn region(&self) -> &str;

    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write a string value.
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    /// Add a member to a set. Returns `true` if it was newly added.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set; empty if the set does not exist.
    async fn set_members(&self, key: &str) -> Result<HashSet<String>>;

    /// Scan the key space incrementally. Start with cursor `0`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Execute a pipeline and return one reply per command, in order.
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>>;

    /// Check that the region is reachable.
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Record Store Port
// =============================================================================

/// Port for the authoritative person dataset.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Full-table scan, used by refresh population.
    async fn find_all(&self) -> Result<Vec<Person>>;

    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Person>>;

    async fn find_by_city(&self, city: &str) -> Result<Vec<Person>>;

    async fn find_by_state(&self, state: &str) -> Result<Vec<Person>>;

    async fn find_by_country(&self, country: &str) -> Result<Vec<Person>>;

    /// Check if the store is reachable.
    async fn health_check(&self) -> Result<bool>;
}

// =============================================================================
// Query Port
// =============================================================================

/// Inbound query contract served to the HTTP layer.
///
/// Implementations never surface cache-internal errors; an `Err` here can
/// only come from the record store on a fallback path.
#[async_trait]
pub trait PeopleQuery: Send + Sync {
    /// Name of the miss/error policy, for logs and status output.
    fn strategy(&self) -> &'static str;

    async fn find_all(&self) -> Result<Vec<Person>>;

    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Person>>;

    async fn find_by_city(&self, city: &str) -> Result<Vec<Person>>;

    async fn find_by_state(&self, state: &str) -> Result<Vec<Person>>;

    async fn find_by_country(&self, country: &str) -> Result<Vec<Person>>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

use super::events::DomainEvent;

/// Port for publishing refresh lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event.
    async fn publish(&self, event: DomainEvent) -> Result<()>;

    /// Publish multiple events.
    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
