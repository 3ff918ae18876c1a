//! HTTP Routes
//!
//! Transport-independent request handling. [`handle`] maps a method and a
//! path to an [`ApiResponse`]; the server module only adapts it to hyper.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::adapters::InMemoryEventCollector;
use crate::cache::{DualBufferStore, MetricsSnapshot, RefreshEngine, RefreshReport};
use crate::domain::{BufferId, DomainEvent, PeopleQuery};
use crate::error::Error;
use crate::monitoring::{HealthChecker, MetricsExporter};

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// Shared handles the routes read from
pub struct ApiState {
    pub query: Arc<dyn PeopleQuery>,
    pub engine: Arc<RefreshEngine>,
    pub buffers: Arc<DualBufferStore>,
    pub health: Arc<HealthChecker>,
    pub exporter: Arc<MetricsExporter>,
    pub recent_events: Arc<InMemoryEventCollector>,
}

/// Response produced by a route
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: JSON,
                body: Bytes::from(body),
            },
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                Self::text(StatusCode::INTERNAL_SERVER_ERROR, "serialization error")
            }
        }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: Bytes::from(body.into()),
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(status, &ErrorBody { error: message.into() })
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Body of `GET /api/cache/status`
#[derive(Debug, Serialize)]
pub struct CacheStatus {
    pub active_buffer: Option<BufferId>,
    pub cached_entries: Option<usize>,
    pub strategy: &'static str,
    pub refreshing: bool,
    pub last_refresh: Option<RefreshReport>,
    pub metrics: MetricsSnapshot,
    pub recent_events: Vec<DomainEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Live,
    Ready,
    Metrics,
    CacheStatus,
    AllPeople,
    ByNationalId(&'a str),
    ByCity(&'a str),
    ByState(&'a str),
    ByCountry(&'a str),
}

fn route(path: &str) -> Option<Route<'_>> {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    let segments: Vec<&str> = trimmed.split('/').collect();

    match segments.as_slice() {
        ["healthz"] | ["livez"] => Some(Route::Live),
        ["readyz"] => Some(Route::Ready),
        ["metrics"] => Some(Route::Metrics),
        ["api", "cache", "status"] => Some(Route::CacheStatus),
        ["api", "people"] => Some(Route::AllPeople),
        ["api", "people", "cpf", value] => Some(Route::ByNationalId(value)),
        ["api", "people", "city", value] => Some(Route::ByCity(value)),
        ["api", "people", "state", value] => Some(Route::ByState(value)),
        ["api", "people", "country", value] => Some(Route::ByCountry(value)),
        _ => None,
    }
}

fn decode_value(raw: &str) -> Result<Cow<'_, str>, ApiResponse> {
    let value = urlencoding::decode(raw).map_err(|e| {
        ApiResponse::error(StatusCode::BAD_REQUEST, format!("invalid path encoding: {}", e))
    })?;
    if value.is_empty() {
        return Err(ApiResponse::error(StatusCode::BAD_REQUEST, "missing lookup value"));
    }
    Ok(value)
}

fn store_failure(e: Error) -> ApiResponse {
    error!("Record store query failed: {}", e);
    ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Active buffer and its entry count, `None` where the regions can't say.
async fn active_view(state: &ApiState) -> (Option<BufferId>, Option<usize>) {
    let Ok(active) = state.buffers.active_buffer_id().await else {
        return (None, None);
    };
    (Some(active), state.buffers.cached_count(active).await.ok())
}

/// Handle one request.
pub async fn handle(state: &ApiState, method: &Method, path: &str) -> ApiResponse {
    let Some(route) = route(path) else {
        return ApiResponse::error(StatusCode::NOT_FOUND, format!("no route for {}", path));
    };
    if method != Method::GET {
        return ApiResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{} not allowed on {}", method, path),
        );
    }
    debug!(?route, "Handling request");

    match route {
        Route::Live => ApiResponse::text(StatusCode::OK, "ok"),
        Route::Ready => {
            let health = state.health.check_all().await;
            let status = if health.status.is_operational() {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            ApiResponse::json(status, &health)
        }
        Route::Metrics => {
            let (active, cached) = active_view(state).await;
            match state.exporter.render(active, cached) {
                Ok(body) => ApiResponse {
                    status: StatusCode::OK,
                    content_type: state.exporter.content_type(),
                    body: Bytes::from(body),
                },
                Err(e) => ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            }
        }
        Route::CacheStatus => {
            let (active_buffer, cached_entries) = active_view(state).await;
            let status = CacheStatus {
                active_buffer,
                cached_entries,
                strategy: state.query.strategy(),
                refreshing: state.engine.is_running(),
                last_refresh: state.engine.last_report(),
                metrics: state.engine.metrics().snapshot(),
                recent_events: state.recent_events.events(),
            };
            ApiResponse::json(StatusCode::OK, &status)
        }
        Route::AllPeople => match state.query.find_all().await {
            Ok(people) => ApiResponse::json(StatusCode::OK, &people),
            Err(e) => store_failure(e),
        },
        Route::ByNationalId(raw) => {
            let value = match decode_value(raw) {
                Ok(v) => v,
                Err(response) => return response,
            };
            match state.query.find_by_national_id(&value).await {
                Ok(Some(person)) => ApiResponse::json(StatusCode::OK, &person),
                Ok(None) => ApiResponse::error(
                    StatusCode::NOT_FOUND,
                    format!("no person with cpf {}", value),
                ),
                Err(e) => store_failure(e),
            }
        }
        Route::ByCity(raw) | Route::ByState(raw) | Route::ByCountry(raw) => {
            let value = match decode_value(raw) {
                Ok(v) => v,
                Err(response) => return response,
            };
            let result = match route {
                Route::ByCity(_) => state.query.find_by_city(&value).await,
                Route::ByState(_) => state.query.find_by_state(&value).await,
                _ => state.query.find_by_country(&value).await,
            };
            match result {
                Ok(people) => ApiResponse::json(StatusCode::OK, &people),
                Err(e) => store_failure(e),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
