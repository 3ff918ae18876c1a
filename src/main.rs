//! People Cache
//!
//! Serves the people dataset from a double-buffered key-value cache that a
//! cron schedule rebuilds from the authoritative record store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          People Cache                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Scheduler   │───▶│   Refresh    │───▶│ Dual Buffers │       │
//! │  │   (cron)     │    │   Engine     │    │ (control+1+2)│       │
//! │  └──────────────┘    └──────────────┘    └──────┬───────┘       │
//! │                                                  │               │
//! │  ┌──────────────┐    ┌──────────────┐           │               │
//! │  │   HTTP API   │───▶│ Query Facade │◀──────────┘               │
//! │  └──────────────┘    └──────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use people_cache::adapters::{
    CompositeEventPublisher, InMemoryEventCollector, InMemoryKeyValueStore, InMemoryRecordStore,
    LoggingEventPublisher,
};
use people_cache::api::{self, ApiState};
use people_cache::cache::{
    BufferConfig, CacheMetrics, CacheReader, DegradingPeopleQuery, DualBufferStore,
    FallbackPeopleQuery, JsonRecordCodec, RefreshConfig, RefreshEngine, RefreshScheduler,
    SchedulerConfig,
};
use people_cache::config::{parse_duration, KvBackend, QueryStrategy};
use people_cache::domain::{KeyValueStore, PeopleQuery};
use people_cache::monitoring::{HealthChecker, MetricsExporter};
use people_cache::Result;

/// Events kept for `/api/cache/status`
const RECENT_EVENTS: usize = 32;

// =============================================================================
// CLI Arguments
// =============================================================================

/// People Cache - double-buffered read cache for the people dataset
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// YAML or JSON file holding the authoritative people records
    #[arg(long, env = "SEED_FILE", default_value = "data/people.yaml")]
    seed_file: PathBuf,

    /// Where the control and buffer regions live
    #[arg(long, env = "KV_BACKEND", value_enum, default_value_t = KvBackend::Memory)]
    kv_backend: KvBackend,

    /// Redis server URL (redis backend only)
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Redis DB holding the active-buffer flag
    #[arg(long, env = "REDIS_CONTROL_DB", default_value = "0")]
    redis_control_db: i64,

    /// Redis DB of buffer one
    #[arg(long, env = "REDIS_BUFFER_ONE_DB", default_value = "1")]
    redis_buffer_one_db: i64,

    /// Redis DB of buffer two
    #[arg(long, env = "REDIS_BUFFER_TWO_DB", default_value = "2")]
    redis_buffer_two_db: i64,

    /// Refresh schedule (cron with seconds field)
    #[arg(long, env = "REFRESH_CRON", default_value = "0 */5 * * * *")]
    refresh_cron: String,

    /// Run one refresh immediately at startup
    #[arg(long, env = "REFRESH_ON_START", default_value_t = true, action = clap::ArgAction::Set)]
    refresh_on_start: bool,

    /// Records written per pipeline
    #[arg(long, env = "REFRESH_BATCH_SIZE", default_value = "100")]
    batch_size: usize,

    /// Maximum concurrent batch writers
    #[arg(long, env = "REFRESH_WORKERS", default_value = "10")]
    workers: usize,

    /// Limit on the populate phase (e.g. "10m", "90s")
    #[arg(long, env = "REFRESH_TIMEOUT", default_value = "10m")]
    refresh_timeout: String,

    /// Keys requested per SCAN page when clearing a buffer
    #[arg(long, env = "SCAN_COUNT", default_value = "500")]
    scan_count: usize,

    /// Behaviour when the cache can't answer a query
    #[arg(long, env = "QUERY_STRATEGY", value_enum, default_value_t = QueryStrategy::Fallback)]
    query_strategy: QueryStrategy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting People Cache");
    info!("  Listen address: {}", args.listen_addr);
    info!("  Seed file: {}", args.seed_file.display());
    info!("  Key-value backend: {}", args.kv_backend);
    info!("  Refresh schedule: {}", args.refresh_cron);
    info!("  Query strategy: {}", args.query_strategy);

    let refresh_config = RefreshConfig {
        batch_size: args.batch_size.max(1),
        max_workers: args.workers.max(1),
        timeout: parse_duration(&args.refresh_timeout)?,
    };
    let scheduler_config = SchedulerConfig {
        cron: args.refresh_cron.clone(),
        run_on_start: args.refresh_on_start,
    };

    // Record store
    let records = Arc::new(InMemoryRecordStore::from_file(&args.seed_file).map_err(|e| {
        error!("Failed to load seed file: {}", e);
        e
    })?);

    // Cache regions
    let (control, buffer_one, buffer_two) = connect_regions(&args).await?;
    let buffers = Arc::new(DualBufferStore::with_config(
        control,
        buffer_one,
        buffer_two,
        BufferConfig {
            scan_count: args.scan_count.max(1),
        },
    ));

    // Events and metrics
    let recent_events = Arc::new(InMemoryEventCollector::bounded(RECENT_EVENTS));
    let events = Arc::new(
        CompositeEventPublisher::new()
            .with_publisher(Arc::new(LoggingEventPublisher::info_level()))
            .with_publisher(recent_events.clone()),
    );
    let metrics = Arc::new(CacheMetrics::new());
    let codec = Arc::new(JsonRecordCodec::new());

    let engine = RefreshEngine::new(
        refresh_config,
        buffers.clone(),
        records.clone(),
        codec.clone(),
        events,
        metrics.clone(),
    );

    let reader = CacheReader::new(buffers.clone(), codec, metrics.clone());
    let query: Arc<dyn PeopleQuery> = match args.query_strategy {
        QueryStrategy::Fallback => Arc::new(FallbackPeopleQuery::new(reader, records.clone())),
        QueryStrategy::Degrade => Arc::new(DegradingPeopleQuery::new(reader)),
        QueryStrategy::DegradeMissFallback => {
            Arc::new(DegradingPeopleQuery::new(reader).with_miss_fallback(records.clone()))
        }
    };

    let health = HealthChecker::new(records, buffers.control().clone(), metrics.clone());
    let state = Arc::new(ApiState {
        query,
        engine: engine.clone(),
        buffers,
        health: Arc::new(health),
        exporter: Arc::new(MetricsExporter::new(metrics)?),
        recent_events,
    });

    // Shutdown on Ctrl-C
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    // Start refresh scheduler
    let scheduler = RefreshScheduler::new(engine, scheduler_config, shutdown.clone())?;
    let scheduler_handle = tokio::spawn(scheduler.run());

    // Run the API server
    let listener = api::bind(&args.listen_addr).await?;
    let served = api::serve(listener, state, shutdown.clone()).await;
    shutdown.cancel();

    if let Err(e) = scheduler_handle.await {
        error!("Refresh scheduler task failed: {}", e);
    }

    info!("People Cache shutdown complete");
    served
}

// =============================================================================
// Cache Regions
// =============================================================================

type Regions = (
    Arc<dyn KeyValueStore>,
    Arc<dyn KeyValueStore>,
    Arc<dyn KeyValueStore>,
);

async fn connect_regions(args: &Args) -> Result<Regions> {
    match args.kv_backend {
        KvBackend::Memory => Ok((
            Arc::new(InMemoryKeyValueStore::new("control")),
            Arc::new(InMemoryKeyValueStore::new("buffer-1")),
            Arc::new(InMemoryKeyValueStore::new("buffer-2")),
        )),
        KvBackend::Redis => connect_redis(args).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(args: &Args) -> Result<Regions> {
    use people_cache::adapters::RedisKeyValueStore;

    let control =
        RedisKeyValueStore::connect("control", &args.redis_url, args.redis_control_db).await?;
    let buffer_one =
        RedisKeyValueStore::connect("buffer-1", &args.redis_url, args.redis_buffer_one_db).await?;
    let buffer_two =
        RedisKeyValueStore::connect("buffer-2", &args.redis_url, args.redis_buffer_two_db).await?;
    info!("Connected to Redis at {}", args.redis_url);

    Ok((Arc::new(control), Arc::new(buffer_one), Arc::new(buffer_two)))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_args: &Args) -> Result<Regions> {
    Err(people_cache::Error::Config(
        "redis backend requested but this binary was built without the `redis` feature"
            .to_string(),
    ))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "redis=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
