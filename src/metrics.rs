// Prometheus metrics for gateway monitoring
//
// Exposed on the /metrics HTTP endpoint when enabled:
// - Cache hits and misses per method (counters)
// - Rate limiter wait times (histogram)
// - Upstream call outcomes and cooldowns (counters)
// - Highscore update outcomes and snapshot saves (counters)

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Cache metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cache_hits_total", "Responses served from the cache"),
        &["method"]
    ).expect("Failed to create cache hits metric");

    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cache_misses_total", "Cache misses that triggered a fetch"),
        &["method"]
    ).expect("Failed to create cache misses metric");

    // Rate limiter metrics
    pub static ref RATE_LIMIT_WAIT_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "rate_limit_wait_seconds",
            "Time callers spent waiting for window capacity"
        ),
        &["method"]
    ).expect("Failed to create rate limit wait metric");

    pub static ref UPSTREAM_COOLDOWNS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "upstream_cooldowns_total",
            "Cooldowns applied after upstream-reported rate limits"
        ),
        &["method"]
    ).expect("Failed to create cooldowns metric");

    // Upstream metrics
    pub static ref UPSTREAM_CALLS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("upstream_calls_total", "Upstream API calls by status code"),
        &["status"]
    ).expect("Failed to create upstream calls metric");

    // Highscore metrics
    pub static ref HIGHSCORE_UPDATES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("highscore_updates_total", "Highscore updates by outcome"),
        &["outcome"]
    ).expect("Failed to create highscore updates metric");

    pub static ref SNAPSHOT_SAVES_TOTAL: IntCounter = IntCounter::new(
        "snapshot_saves_total",
        "Successful highscore snapshot writes"
    ).expect("Failed to create snapshot saves metric");

    pub static ref SNAPSHOT_SAVE_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "snapshot_save_errors_total",
        "Failed highscore snapshot writes"
    ).expect("Failed to create snapshot save errors metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMIT_WAIT_SECONDS.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_COOLDOWNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_CALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HIGHSCORE_UPDATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SNAPSHOT_SAVES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SNAPSHOT_SAVE_ERRORS_TOTAL.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

/// Serve the metrics endpoint.
///
/// Runs until the process exits; callers spawn it when metrics are enabled.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    use anyhow::Context;
    use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};

    async fn metrics_handler() -> impl IntoResponse {
        match gather_metrics() {
            Ok(text) => (StatusCode::OK, text),
            Err(e) => {
                tracing::error!("Failed to gather metrics: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(|| async { StatusCode::OK }));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting metrics server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind metrics server")?;
    axum::serve(listener, app)
        .await
        .context("Metrics server error")?;
    Ok(())
}
