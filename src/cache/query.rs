//! Cache Query Facade
//!
//! Serves person lookups from the active buffer. Two [`PeopleQuery`]
//! implementations differ only in what they do when the cache can't answer:
//!
//! | Variant | Index empty | Cache error |
//! |---|---|---|
//! | [`FallbackPeopleQuery`] | record store | record store |
//! | [`DegradingPeopleQuery`] | empty | empty |
//! | [`DegradingPeopleQuery::with_miss_fallback`] | record store | empty |

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

use super::buffers::DualBufferStore;
use super::codec::RecordCodec;
use super::keys::QueryDimension;
use super::metrics::CacheMetrics;
use crate::domain::{PeopleQuery, Person, Pipeline, RecordStore, Reply};
use crate::error::{Error, Result};

/// Outcome of reading one index from the cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The index had members; decoded records sorted by id
    Hit(Vec<Person>),
    /// The index was empty or absent
    Miss,
    /// A store error occurred; already logged
    Failed,
}

// =============================================================================
// Cache Reader
// =============================================================================

/// Reads index sets and their entries from the active buffer.
#[derive(Clone)]
pub struct CacheReader {
    buffers: Arc<DualBufferStore>,
    codec: Arc<dyn RecordCodec>,
    metrics: Arc<CacheMetrics>,
}

impl CacheReader {
    pub fn new(
        buffers: Arc<DualBufferStore>,
        codec: Arc<dyn RecordCodec>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            buffers,
            codec,
            metrics,
        }
    }

    pub fn buffers(&self) -> &Arc<DualBufferStore> {
        &self.buffers
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Look up one index. Store errors are logged and reported as
    /// [`CacheLookup::Failed`].
    #[instrument(skip(self))]
    pub async fn read(&self, dimension: QueryDimension, value: &str) -> CacheLookup {
        match self.lookup(dimension, value).await {
            Ok(Some(people)) => {
                self.metrics.record_hit();
                CacheLookup::Hit(people)
            }
            Ok(None) => {
                self.metrics.record_miss();
                debug!("Cache miss for {} index", dimension);
                CacheLookup::Miss
            }
            Err(e) => {
                self.metrics.record_cache_error();
                if e.is_store_error() {
                    warn!("Cache read failed for {} index: {}", dimension, e);
                } else {
                    error!("Unexpected cache read failure for {} index: {}", dimension, e);
                }
                CacheLookup::Failed
            }
        }
    }

    async fn lookup(&self, dimension: QueryDimension, value: &str) -> Result<Option<Vec<Person>>> {
        let index_key = dimension.index_key(value);

        // The flag is resolved once; both reads below hit the same buffer.
        let (buffer_id, region) = self.buffers.active_buffer().await?;

        let members = region.set_members(&index_key).await?;
        if members.is_empty() {
            return Ok(None);
        }

        let keys: Vec<String> = members.into_iter().collect();
        let mut pipeline = Pipeline::with_capacity(1);
        pipeline.multi_get(keys.clone());

        let values = match region.execute(pipeline).await?.into_iter().next() {
            Some(Reply::Values(values)) => values,
            other => {
                return Err(Error::Store(format!(
                    "unexpected reply to multi-get on {}: {:?}",
                    region.region(),
                    other
                )))
            }
        };

        let mut people = Vec::with_capacity(values.len());
        let mut failures = 0u64;
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(payload) => match self.codec.decode(&payload) {
                    Ok(person) => people.push(person),
                    Err(e) => {
                        warn!(key = %key, buffer = %buffer_id, "Skipping cache entry: {}", e);
                        failures += 1;
                    }
                },
                None => {
                    warn!(key = %key, buffer = %buffer_id, "Indexed cache entry is missing");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            self.metrics.record_decode_failures(failures);
        }

        people.sort_by_key(|p| p.id);
        Ok(Some(people))
    }
}

impl std::fmt::Debug for CacheReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReader")
            .field("buffers", &self.buffers)
            .field("codec", &self.codec.name())
            .finish()
    }
}

// =============================================================================
// Fallback Variant
// =============================================================================

/// Answers from the record store whenever the cache can't.
#[derive(Clone)]
pub struct FallbackPeopleQuery {
    reader: CacheReader,
    records: Arc<dyn RecordStore>,
}

impl FallbackPeopleQuery {
    pub fn new(reader: CacheReader, records: Arc<dyn RecordStore>) -> Self {
        Self { reader, records }
    }

    async fn many<F, Fut>(&self, dimension: QueryDimension, value: &str, fallback: F) -> Result<Vec<Person>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Person>>>,
    {
        match self.reader.read(dimension, value).await {
            CacheLookup::Hit(people) => Ok(people),
            CacheLookup::Miss | CacheLookup::Failed => {
                self.reader.metrics().record_fallback();
                fallback().await
            }
        }
    }
}

#[async_trait]
impl PeopleQuery for FallbackPeopleQuery {
    fn strategy(&self) -> &'static str {
        "fallback"
    }

    async fn find_all(&self) -> Result<Vec<Person>> {
        self.many(QueryDimension::All, "", || self.records.find_all())
            .await
    }

    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Person>> {
        match self.reader.read(QueryDimension::NationalId, national_id).await {
            CacheLookup::Hit(people) => Ok(people.into_iter().next()),
            CacheLookup::Miss | CacheLookup::Failed => {
                self.reader.metrics().record_fallback();
                self.records.find_by_national_id(national_id).await
            }
        }
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::City, city, || self.records.find_by_city(city))
            .await
    }

    async fn find_by_state(&self, state: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::State, state, || self.records.find_by_state(state))
            .await
    }

    async fn find_by_country(&self, country: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::Country, country, || {
            self.records.find_by_country(country)
        })
        .await
    }
}

// =============================================================================
// Degrading Variant
// =============================================================================

/// Answers empty when the cache can't, optionally falling back on misses.
#[derive(Clone)]
pub struct DegradingPeopleQuery {
    reader: CacheReader,
    miss_fallback: Option<Arc<dyn RecordStore>>,
}

impl DegradingPeopleQuery {
    pub fn new(reader: CacheReader) -> Self {
        Self {
            reader,
            miss_fallback: None,
        }
    }

    /// Send index misses (but not cache errors) to the record store.
    pub fn with_miss_fallback(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.miss_fallback = Some(records);
        self
    }

    fn degraded<T: Default>(&self) -> Result<T> {
        self.reader.metrics().record_degraded();
        Ok(T::default())
    }

    async fn many<F, Fut>(&self, dimension: QueryDimension, value: &str, fallback: F) -> Result<Vec<Person>>
    where
        F: FnOnce(Arc<dyn RecordStore>) -> Fut,
        Fut: Future<Output = Result<Vec<Person>>>,
    {
        match self.reader.read(dimension, value).await {
            CacheLookup::Hit(people) => Ok(people),
            CacheLookup::Miss => match &self.miss_fallback {
                Some(records) => {
                    self.reader.metrics().record_fallback();
                    fallback(records.clone()).await
                }
                None => self.degraded(),
            },
            CacheLookup::Failed => self.degraded(),
        }
    }
}

#[async_trait]
impl PeopleQuery for DegradingPeopleQuery {
    fn strategy(&self) -> &'static str {
        if self.miss_fallback.is_some() {
            "degrade-miss-fallback"
        } else {
            "degrade"
        }
    }

    async fn find_all(&self) -> Result<Vec<Person>> {
        self.many(QueryDimension::All, "", |records| async move {
            records.find_all().await
        })
        .await
    }

    async fn find_by_national_id(&self, national_id: &str) -> Result<Option<Person>> {
        match self.reader.read(QueryDimension::NationalId, national_id).await {
            CacheLookup::Hit(people) => Ok(people.into_iter().next()),
            CacheLookup::Miss => match &self.miss_fallback {
                Some(records) => {
                    self.reader.metrics().record_fallback();
                    records.find_by_national_id(national_id).await
                }
                None => self.degraded(),
            },
            CacheLookup::Failed => self.degraded(),
        }
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::City, city, |records| async move {
            records.find_by_city(city).await
        })
        .await
    }

    async fn find_by_state(&self, state: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::State, state, |records| async move {
            records.find_by_state(state).await
        })
        .await
    }

    async fn find_by_country(&self, country: &str) -> Result<Vec<Person>> {
        self.many(QueryDimension::Country, country, |records| async move {
            records.find_by_country(country).await
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
