//! Event Publisher Adapter
//!
//! Implements the `EventPublisher` port for refresh lifecycle events.

use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::events::DomainEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Logging-based event publisher.
///
/// Failures and skips are logged at warn; everything else at info or debug.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher {
    info_level: bool,
}

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let event_type = event.event_type();
        let run_id = event.run_id().unwrap_or("-").to_string();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        match event {
            DomainEvent::RefreshFailed { .. } | DomainEvent::RefreshSkipped { .. } => {
                warn!(event_type = %event_type, run_id = %run_id, event = %json, "Refresh event");
            }
            _ if self.info_level => {
                info!(event_type = %event_type, run_id = %run_id, event = %json, "Refresh event");
            }
            _ => {
                debug!(event_type = %event_type, run_id = %run_id, event = %json, "Refresh event");
            }
        }

        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

/// In-memory event collector.
///
/// Unbounded by default for tests; [`InMemoryEventCollector::bounded`] keeps
/// only the most recent events for the status endpoint.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: parking_lot::RwLock<VecDeque<DomainEvent>>,
    capacity: Option<usize>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` events, dropping the oldest.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            events: parking_lot::RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Get all collected events, oldest first.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    fn push(&self, events: impl IntoIterator<Item = DomainEvent>) {
        let mut guard = self.events.write();
        for event in events {
            if let Some(capacity) = self.capacity {
                if capacity == 0 {
                    return;
                }
                while guard.len() >= capacity {
                    guard.pop_front();
                }
            }
            guard.push_back(event);
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.push(std::iter::once(event));
        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        self.push(events);
        Ok(())
    }
}

/// Composite event publisher that publishes to multiple backends.
#[derive(Default)]
pub struct CompositeEventPublisher {
    publishers: Vec<std::sync::Arc<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(mut self, publisher: std::sync::Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }
}

impl std::fmt::Debug for CompositeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEventPublisher")
            .field("publisher_count", &self.publishers.len())
            .finish()
    }
}

#[async_trait]
impl EventPublisher for CompositeEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish(event.clone()).await?;
        }
        Ok(())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish_all(events.clone()).await?;
        }
        Ok(())
    }
}
