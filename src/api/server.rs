//! HTTP Server
//!
//! hyper accept loop serving [`handle`] until the shutdown token fires.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::routes::{handle, ApiResponse, ApiState};
use crate::error::{Error, Result};

impl ApiResponse {
    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        response
    }
}

/// Bind the API listener.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", addr, e)))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind API server: {}", e)))
}

/// Serve requests on `listener` until `shutdown` is cancelled.
///
/// Connections already accepted finish on their own tasks.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("API server listening on {}", addr);
    }

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("API server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("API server accept error: {}", e)))?,
        };
        debug!(%peer, "Accepted connection");

        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move {
                    let response = handle(&state, req.method(), req.uri().path()).await;
                    Ok::<_, Infallible>(response.into_response())
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("API server connection error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventCollector, InMemoryKeyValueStore, InMemoryRecordStore};
    use crate::cache::{
        CacheMetrics, CacheReader, DegradingPeopleQuery, DualBufferStore, JsonRecordCodec,
        RefreshConfig, RefreshEngine,
    };
    use crate::monitoring::{HealthChecker, MetricsExporter};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn state() -> Arc<ApiState> {
        let control = Arc::new(InMemoryKeyValueStore::new("control"));
        let buffers = Arc::new(DualBufferStore::new(
            control.clone(),
            Arc::new(InMemoryKeyValueStore::new("buffer-1")),
            Arc::new(InMemoryKeyValueStore::new("buffer-2")),
        ));
        let records = Arc::new(InMemoryRecordStore::default());
        let metrics = Arc::new(CacheMetrics::new());
        let events = Arc::new(InMemoryEventCollector::bounded(8));
        let codec = Arc::new(JsonRecordCodec::new());
        let engine = RefreshEngine::new(
            RefreshConfig::default(),
            buffers.clone(),
            records.clone(),
            codec.clone(),
            events.clone(),
            metrics.clone(),
        );
        Arc::new(ApiState {
            query: Arc::new(DegradingPeopleQuery::new(CacheReader::new(
                buffers.clone(),
                codec,
                metrics.clone(),
            ))),
            engine,
            buffers,
            health: Arc::new(HealthChecker::new(records, control, metrics.clone())),
            exporter: Arc::new(MetricsExporter::new(metrics).unwrap()),
            recent_events: events,
        })
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        raw
    }

    #[tokio::test]
    async fn test_serves_until_cancelled() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, state(), shutdown.clone()));

        let raw = get(addr, "/healthz").await;
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.ends_with("ok"));

        let raw = get(addr, "/api/people").await;
        assert!(raw.contains("application/json"));
        assert!(raw.ends_with("[]"));

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        assert!(matches!(bind("not-an-addr").await, Err(Error::Config(_))));
    }
}
