//! Domain Events
//!
//! Immutable records of what happened during cache refresh runs. The refresh
//! engine publishes them through the [`EventPublisher`](super::ports::EventPublisher)
//! port for audit logging and tests.
//!
//! # Example
//!
//! ```ignore
//! let event = DomainEvent::buffer_swapped(run_id, BufferId::One, BufferId::Two);
//! event_publisher.publish(event).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ports::BufferId;

/// Domain event representing a significant occurrence in a refresh run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A refresh run began and selected its target buffer.
    RefreshStarted {
        run_id: String,
        target_buffer: BufferId,
        timestamp: DateTime<Utc>,
    },

    /// Stale entries and indexes were removed from the target buffer.
    BufferCleared {
        run_id: String,
        buffer: BufferId,
        keys_removed: u64,
        timestamp: DateTime<Utc>,
    },

    /// The target buffer was repopulated from the record store.
    BufferPopulated {
        run_id: String,
        buffer: BufferId,
        records_cached: u64,
        records_skipped: u64,
        batches: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The active flag now names the freshly populated buffer.
    BufferSwapped {
        run_id: String,
        from_buffer: BufferId,
        to_buffer: BufferId,
        timestamp: DateTime<Utc>,
    },

    /// The run aborted; the previously active buffer keeps serving.
    RefreshFailed {
        run_id: String,
        buffer: Option<BufferId>,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A trigger arrived while another run held the single-flight guard.
    RefreshSkipped {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::RefreshStarted { timestamp, .. } => *timestamp,
            DomainEvent::BufferCleared { timestamp, .. } => *timestamp,
            DomainEvent::BufferPopulated { timestamp, .. } => *timestamp,
            DomainEvent::BufferSwapped { timestamp, .. } => *timestamp,
            DomainEvent::RefreshFailed { timestamp, .. } => *timestamp,
            DomainEvent::RefreshSkipped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::RefreshStarted { .. } => "RefreshStarted",
            DomainEvent::BufferCleared { .. } => "BufferCleared",
            DomainEvent::BufferPopulated { .. } => "BufferPopulated",
            DomainEvent::BufferSwapped { .. } => "BufferSwapped",
            DomainEvent::RefreshFailed { .. } => "RefreshFailed",
            DomainEvent::RefreshSkipped { .. } => "RefreshSkipped",
        }
    }

    /// Get the refresh run ID if applicable.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            DomainEvent::RefreshStarted { run_id, .. } => Some(run_id),
            DomainEvent::BufferCleared { run_id, .. } => Some(run_id),
            DomainEvent::BufferPopulated { run_id, .. } => Some(run_id),
            DomainEvent::BufferSwapped { run_id, .. } => Some(run_id),
            DomainEvent::RefreshFailed { run_id, .. } => Some(run_id),
            DomainEvent::RefreshSkipped { .. } => None,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl DomainEvent {
    pub fn refresh_started(run_id: impl Into<String>, target_buffer: BufferId) -> Self {
        DomainEvent::RefreshStarted {
            run_id: run_id.into(),
            target_buffer,
            timestamp: Utc::now(),
        }
    }

    pub fn buffer_cleared(run_id: impl Into<String>, buffer: BufferId, keys_removed: u64) -> Self {
        DomainEvent::BufferCleared {
            run_id: run_id.into(),
            buffer,
            keys_removed,
            timestamp: Utc::now(),
        }
    }

    pub fn buffer_populated(
        run_id: impl Into<String>,
        buffer: BufferId,
        records_cached: u64,
        records_skipped: u64,
        batches: usize,
        duration: Duration,
    ) -> Self {
        DomainEvent::BufferPopulated {
            run_id: run_id.into(),
            buffer,
            records_cached,
            records_skipped,
            batches,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    pub fn buffer_swapped(run_id: impl Into<String>, from_buffer: BufferId, to_buffer: BufferId) -> Self {
        DomainEvent::BufferSwapped {
            run_id: run_id.into(),
            from_buffer,
            to_buffer,
            timestamp: Utc::now(),
        }
    }

    pub fn refresh_failed(
        run_id: impl Into<String>,
        buffer: Option<BufferId>,
        reason: impl Into<String>,
    ) -> Self {
        DomainEvent::RefreshFailed {
            run_id: run_id.into(),
            buffer,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn refresh_skipped(reason: impl Into<String>) -> Self {
        DomainEvent::RefreshSkipped {
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = DomainEvent::buffer_swapped("run-1", BufferId::One, BufferId::Two);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"BufferSwapped\""));
        assert!(json.contains("\"to_buffer\":\"2\""));

        let deserialized: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.event_type(), "BufferSwapped");
    }

    #[test]
    fn test_run_id_extraction() {
        let event = DomainEvent::buffer_cleared("run-7", BufferId::Two, 42);
        assert_eq!(event.run_id(), Some("run-7"));

        let skipped = DomainEvent::refresh_skipped("refresh already in progress");
        assert_eq!(skipped.run_id(), None);
    }

    #[test]
    fn test_timestamp() {
        let before = Utc::now();
        let event = DomainEvent::refresh_started("run-1", BufferId::Two);
        let after = Utc::now();

        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= after);
    }

    #[test]
    fn test_populated_event_duration() {
        let event = DomainEvent::buffer_populated(
            "run-1",
            BufferId::One,
            250,
            3,
            3,
            Duration::from_millis(1500),
        );

        assert_eq!(event.event_type(), "BufferPopulated");
        match event {
            DomainEvent::BufferPopulated {
                duration_ms,
                records_cached,
                ..
            } => {
                assert_eq!(duration_ms, 1500);
                assert_eq!(records_cached, 250);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
