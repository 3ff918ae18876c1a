//! Query Integration Tests
//!
//! Exercises the query facade and the HTTP routes over a refreshed cache:
//! - Fallback and degrade strategies
//! - Reads pinned to the active buffer
//! - HTTP surface

use std::sync::Arc;

use hyper::{Method, StatusCode};

use people_cache::adapters::{InMemoryEventCollector, InMemoryKeyValueStore, InMemoryRecordStore};
use people_cache::api::{handle, ApiState};
use people_cache::cache::{
    CacheMetrics, CacheReader, DegradingPeopleQuery, DualBufferStore, FallbackPeopleQuery,
    JsonRecordCodec, RefreshConfig, RefreshEngine,
};
use people_cache::domain::PeopleQuery;
use people_cache::monitoring::{HealthChecker, MetricsExporter};

const SEED: &str = include_str!("../data/people.yaml");

struct Harness {
    control: Arc<InMemoryKeyValueStore>,
    records: Arc<InMemoryRecordStore>,
    metrics: Arc<CacheMetrics>,
    events: Arc<InMemoryEventCollector>,
    buffers: Arc<DualBufferStore>,
    engine: Arc<RefreshEngine>,
    reader: CacheReader,
}

impl Harness {
    fn new() -> Self {
        let control = Arc::new(InMemoryKeyValueStore::new("control"));
        let buffers = Arc::new(DualBufferStore::new(
            control.clone(),
            Arc::new(InMemoryKeyValueStore::new("buffer-1")),
            Arc::new(InMemoryKeyValueStore::new("buffer-2")),
        ));
        let records = Arc::new(InMemoryRecordStore::from_yaml_str(SEED).unwrap());
        let metrics = Arc::new(CacheMetrics::new());
        let events = Arc::new(InMemoryEventCollector::bounded(16));
        let codec = Arc::new(JsonRecordCodec::new());
        let engine = RefreshEngine::new(
            RefreshConfig::default(),
            buffers.clone(),
            records.clone(),
            codec.clone(),
            events.clone(),
            metrics.clone(),
        );
        let reader = CacheReader::new(buffers.clone(), codec, metrics.clone());
        Self {
            control,
            records,
            metrics,
            events,
            buffers,
            engine,
            reader,
        }
    }

    fn fallback(&self) -> FallbackPeopleQuery {
        FallbackPeopleQuery::new(self.reader.clone(), self.records.clone())
    }

    fn degrade(&self) -> DegradingPeopleQuery {
        DegradingPeopleQuery::new(self.reader.clone())
    }

    fn api(&self, query: Arc<dyn PeopleQuery>) -> ApiState {
        ApiState {
            query,
            engine: self.engine.clone(),
            buffers: self.buffers.clone(),
            health: Arc::new(HealthChecker::new(
                self.records.clone(),
                self.control.clone(),
                self.metrics.clone(),
            )),
            exporter: Arc::new(MetricsExporter::new(self.metrics.clone()).unwrap()),
            recent_events: self.events.clone(),
        }
    }
}

fn ids(people: &[people_cache::Person]) -> Vec<i64> {
    people.iter().map(|p| p.id).collect()
}

// =============================================================================
// Fallback Strategy
// =============================================================================

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_cold_cache_falls_back_to_records() {
        let h = Harness::new();
        let query = h.fallback();

        let people = query.find_by_state("SP").await.unwrap();
        assert_eq!(ids(&people), vec![1, 3]);

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.fallbacks, 1);
    }

    #[tokio::test]
    async fn test_warm_cache_answers_without_store() {
        let h = Harness::new();
        h.engine.refresh().await.unwrap();
        h.records.set_available(false);
        let query = h.fallback();

        assert_eq!(query.find_all().await.unwrap().len(), 6);
        assert_eq!(ids(&query.find_by_country("Brasil").await.unwrap()), vec![1, 2, 3, 4]);
        assert_eq!(ids(&query.find_by_city("São Paulo").await.unwrap()), vec![1]);

        let diego = query.find_by_national_id("222.333.444-55").await.unwrap().unwrap();
        assert_eq!(diego.name, "Diego Almeida");
        assert_eq!(diego.city(), Some("Rio de Janeiro"));

        assert_eq!(h.metrics.snapshot().hits, 4);
        assert_eq!(h.metrics.snapshot().fallbacks, 0);
    }

    #[tokio::test]
    async fn test_cache_serves_snapshot_until_next_refresh() {
        let h = Harness::new();
        h.engine.refresh().await.unwrap();
        h.records.remove(5);
        let query = h.fallback();

        assert_eq!(query.find_by_country("Portugal").await.unwrap().len(), 1);

        h.engine.refresh().await.unwrap();
        // Index miss now, and the store agrees.
        assert!(query.find_by_country("Portugal").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_control_outage_falls_back() {
        let h = Harness::new();
        h.engine.refresh().await.unwrap();
        h.control.set_available(false);

        let people = h.fallback().find_by_state("RJ").await.unwrap();
        assert_eq!(ids(&people), vec![4]);
        assert_eq!(h.metrics.snapshot().cache_errors, 1);
    }

    #[tokio::test]
    async fn test_unknown_national_id() {
        let h = Harness::new();
        h.engine.refresh().await.unwrap();

        assert!(h
            .fallback()
            .find_by_national_id("000.000.000-00")
            .await
            .unwrap()
            .is_none());
    }
}

// =============================================================================
// Degrade Strategy
// =============================================================================

mod degrade_tests {
    use super::*;

    #[tokio::test]
    async fn test_cold_cache_degrades_to_empty() {
        let h = Harness::new();
        let query = h.degrade();

        assert!(query.find_all().await.unwrap().is_empty());
        assert!(query.find_by_national_id("123.456.789-00").await.unwrap().is_none());
        assert_eq!(h.metrics.snapshot().degraded_responses, 2);
    }

    #[tokio::test]
    async fn test_miss_fallback_only_covers_misses() {
        let h = Harness::new();
        let query = h.degrade().with_miss_fallback(h.records.clone());

        assert_eq!(ids(&query.find_by_state("PE").await.unwrap()), vec![2]);

        h.control.set_available(false);
        assert!(query.find_by_state("PE").await.unwrap().is_empty());
        assert_eq!(h.metrics.snapshot().degraded_responses, 1);
    }
}

// =============================================================================
// HTTP Surface
// =============================================================================

mod http_tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_by_encoded_city() {
        let h = Harness::new();
        h.engine.refresh().await.unwrap();
        let api = h.api(Arc::new(h.fallback()));

        let response = handle(&api, &Method::GET, "/api/people/city/Rio%20de%20Janeiro").await;
        assert_eq!(response.status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body[0]["cpf"], "222.333.444-55");
        assert_eq!(body[0]["address"]["district"], "Botafogo");
    }

    #[tokio::test]
    async fn test_store_failure_on_fallback_is_500() {
        let h = Harness::new();
        h.records.set_available(false);
        let api = h.api(Arc::new(h.fallback()));

        let response = handle(&api, &Method::GET, "/api/people/state/SP").await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle(&api, &Method::GET, "/readyz").await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_degrade_never_touches_store() {
        let h = Harness::new();
        h.records.set_available(false);
        let api = h.api(Arc::new(h.degrade()));

        let response = handle(&api, &Method::GET, "/api/people/state/SP").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"[]");
    }

    #[tokio::test]
    async fn test_status_after_refresh() {
        let h = Harness::new();
        let report = h.engine.refresh().await.unwrap();
        let api = h.api(Arc::new(h.fallback()));

        let response = handle(&api, &Method::GET, "/api/cache/status").await;
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["active_buffer"], "2");
        assert_eq!(body["last_refresh"]["run_id"], report.run_id);
        assert_eq!(body["metrics"]["last_records_cached"], 6);
        assert_eq!(body["refreshing"], false);
    }
}
