//! Dual-Buffer Cache Store
//!
//! Two interchangeable key-value regions plus a control region holding the
//! active-buffer flag. Refresh only ever mutates the inactive buffer; readers
//! only ever read the buffer the flag names.
//!
//! ```text
//!   control:  cache:activeDb = "1"
//!                  │
//!        ┌─────────┴─────────┐
//!        ▼                   ▼
//!   buffer 1 (active)   buffer 2 (rebuilt by refresh)
//! ```
//!
//! Writing the flag is the swap. There is no cross-buffer read atomicity: a
//! reader that resolved the flag just before a swap finishes its lookup on
//! the old buffer.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use super::keys::{ALL_PEOPLE, CLEAR_PATTERNS};
use crate::domain::{BufferId, KeyValueStore};
use crate::error::Result;

/// Control region key of the active-buffer flag
pub const ACTIVE_BUFFER_KEY: &str = "cache:activeDb";

/// Configuration for the buffer store
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Keys requested per scan page while clearing
    pub scan_count: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { scan_count: 500 }
    }
}

/// Handle over the control region and both buffers.
pub struct DualBufferStore {
    control: Arc<dyn KeyValueStore>,
    buffer_one: Arc<dyn KeyValueStore>,
    buffer_two: Arc<dyn KeyValueStore>,
    config: BufferConfig,
}

impl DualBufferStore {
    pub fn new(
        control: Arc<dyn KeyValueStore>,
        buffer_one: Arc<dyn KeyValueStore>,
        buffer_two: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_config(control, buffer_one, buffer_two, BufferConfig::default())
    }

    pub fn with_config(
        control: Arc<dyn KeyValueStore>,
        buffer_one: Arc<dyn KeyValueStore>,
        buffer_two: Arc<dyn KeyValueStore>,
        config: BufferConfig,
    ) -> Self {
        Self {
            control,
            buffer_one,
            buffer_two,
            config,
        }
    }

    /// Read the active flag, persisting buffer 1 if none is set yet.
    pub async fn active_buffer_id(&self) -> Result<BufferId> {
        match self.control.get(ACTIVE_BUFFER_KEY).await? {
            Some(raw) => BufferId::parse(&String::from_utf8_lossy(&raw)),
            None => {
                debug!("No active buffer flag found, defaulting to buffer 1");
                self.set_active_buffer_id(BufferId::One).await?;
                Ok(BufferId::One)
            }
        }
    }

    pub async fn inactive_buffer_id(&self) -> Result<BufferId> {
        Ok(self.active_buffer_id().await?.other())
    }

    /// Overwrite the active flag. This single write is the swap.
    pub async fn set_active_buffer_id(&self, id: BufferId) -> Result<()> {
        self.control
            .set(ACTIVE_BUFFER_KEY, Bytes::from_static(id.as_str().as_bytes()))
            .await?;
        info!("Switched active cache buffer to {}", id);
        Ok(())
    }

    /// Region backing the given buffer.
    pub fn buffer(&self, id: BufferId) -> Arc<dyn KeyValueStore> {
        match id {
            BufferId::One => self.buffer_one.clone(),
            BufferId::Two => self.buffer_two.clone(),
        }
    }

    /// Resolve the flag and return the serving region with its id.
    pub async fn active_buffer(&self) -> Result<(BufferId, Arc<dyn KeyValueStore>)> {
        let id = self.active_buffer_id().await?;
        Ok((id, self.buffer(id)))
    }

    pub fn control(&self) -> &Arc<dyn KeyValueStore> {
        &self.control
    }

    /// Remove every entry and index key from a buffer.
    ///
    /// Scans page by page and deletes each page before requesting the next,
    /// so the store never has to list the whole key space at once.
    #[instrument(skip(self), fields(buffer = %id))]
    pub async fn clear(&self, id: BufferId) -> Result<u64> {
        let region = self.buffer(id);
        let mut removed = 0u64;

        for pattern in CLEAR_PATTERNS {
            let mut cursor = 0u64;
            loop {
                let page = region.scan(cursor, pattern, self.config.scan_count).await?;
                if !page.keys.is_empty() {
                    removed += region.delete(&page.keys).await?;
                }
                cursor = page.cursor;
                if cursor == 0 {
                    break;
                }
            }
        }
        removed += region.delete(&[ALL_PEOPLE.to_string()]).await?;

        if removed == 0 {
            debug!("Buffer {} was already empty", id);
        } else {
            info!("Cleared {} keys from buffer {}", removed, id);
        }
        Ok(removed)
    }

    /// Number of entries in a buffer's `all` index.
    pub async fn cached_count(&self, id: BufferId) -> Result<usize> {
        let members = self
            .buffer(id)
            .set_members(ALL_PEOPLE)
            .await
            .map_err(|e| {
                warn!("Failed to count cached entries in buffer {}: {}", id, e);
                e
            })?;
        Ok(members.len())
    }
}

impl std::fmt::Debug for DualBufferStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualBufferStore")
            .field("control", &self.control.region())
            .field("buffer_one", &self.buffer_one.region())
            .field("buffer_two", &self.buffer_two.region())
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKeyValueStore;
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn make_store() -> (DualBufferStore, Arc<InMemoryKeyValueStore>) {
        let control = Arc::new(InMemoryKeyValueStore::new("control"));
        let store = DualBufferStore::with_config(
            control.clone(),
            Arc::new(InMemoryKeyValueStore::new("buffer-1")),
            Arc::new(InMemoryKeyValueStore::new("buffer-2")),
            BufferConfig { scan_count: 2 },
        );
        (store, control)
    }

    #[tokio::test]
    async fn test_flag_defaults_to_one_and_persists() {
        let (store, control) = make_store();

        assert!(control.get(ACTIVE_BUFFER_KEY).await.unwrap().is_none());
        assert_eq!(store.active_buffer_id().await.unwrap(), BufferId::One);
        assert_eq!(
            control.get(ACTIVE_BUFFER_KEY).await.unwrap(),
            Some(Bytes::from_static(b"1"))
        );
    }

    #[tokio::test]
    async fn test_inactive_is_complement() {
        let (store, _) = make_store();

        for id in [BufferId::One, BufferId::Two, BufferId::One] {
            store.set_active_buffer_id(id).await.unwrap();
            let active = store.active_buffer_id().await.unwrap();
            let inactive = store.inactive_buffer_id().await.unwrap();
            assert_eq!(active, id);
            assert_eq!(inactive, active.other());
        }
    }

    #[tokio::test]
    async fn test_corrupt_flag_is_an_error() {
        let (store, control) = make_store();
        control
            .set(ACTIVE_BUFFER_KEY, Bytes::from_static(b"7"))
            .await
            .unwrap();

        assert_matches!(
            store.active_buffer_id().await,
            Err(Error::InvalidBufferFlag(v)) if v == "7"
        );
    }

    #[tokio::test]
    async fn test_buffer_routing() {
        let (store, _) = make_store();

        assert_eq!(store.buffer(BufferId::One).region(), "buffer-1");
        assert_eq!(store.buffer(BufferId::Two).region(), "buffer-2");

        store.set_active_buffer_id(BufferId::Two).await.unwrap();
        let (id, region) = store.active_buffer().await.unwrap();
        assert_eq!(id, BufferId::Two);
        assert_eq!(region.region(), "buffer-2");
    }

    #[tokio::test]
    async fn test_clear_removes_cache_keys_only() {
        let (store, _) = make_store();
        let buffer = store.buffer(BufferId::Two);

        for i in 0..5 {
            let key = format!("person_{}_000.000.000-0{}", i, i);
            buffer.set(&key, Bytes::from_static(b"{}")).await.unwrap();
            buffer.set_add("all_people", &key).await.unwrap();
            buffer
                .set_add(&format!("person_by_cpf_000.000.000-0{}", i), &key)
                .await
                .unwrap();
        }
        buffer.set_add("people_by_city_Recife", "person_0_000.000.000-00").await.unwrap();
        buffer.set("unrelated", Bytes::from_static(b"keep")).await.unwrap();

        let removed = store.clear(BufferId::Two).await.unwrap();

        // 5 entries + 5 cpf indexes + 1 city index + all_people
        assert_eq!(removed, 12);
        assert!(buffer.set_members("all_people").await.unwrap().is_empty());
        assert!(buffer.get("unrelated").await.unwrap().is_some());
        assert!(buffer.get("person_0_000.000.000-00").await.unwrap().is_none());
        assert!(buffer.set_members("people_by_city_Recife").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_count_reads_all_people() {
        let (store, control) = make_store();
        let buffer = store.buffer(BufferId::One);
        for key in ["person_1_a", "person_2_b", "person_1_a"] {
            buffer.set_add(ALL_PEOPLE, key).await.unwrap();
        }

        assert_eq!(store.cached_count(BufferId::One).await.unwrap(), 2);
        assert_eq!(store.cached_count(BufferId::Two).await.unwrap(), 0);

        store.clear(BufferId::One).await.unwrap();
        assert_eq!(store.cached_count(BufferId::One).await.unwrap(), 0);

        assert_eq!(store.control().region(), "control");
        control.set_available(false);
        assert_matches!(store.active_buffer_id().await, Err(Error::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_clear_leaves_other_buffer_untouched() {
        let (store, _) = make_store();
        let serving = store.buffer(BufferId::One);
        serving
            .set("person_1_111", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        store.clear(BufferId::Two).await.unwrap();

        assert!(serving.get("person_1_111").await.unwrap().is_some());
    }
}
