//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the tokgrab server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Telegram bot traffic
//! - Orchestrator and store state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tokgrab_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tokgrab_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tokgrab_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tokgrab_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tokgrab_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by event type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tokgrab_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tokgrab_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Telegram Metrics
// =============================================================================

/// Chat updates handled, by what they turned out to be.
pub static TELEGRAM_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tokgrab_telegram_updates_total", "Telegram updates handled"),
        &["kind"],
    )
    .unwrap()
});

/// Outgoing chat messages that could not be delivered.
pub static TELEGRAM_SEND_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tokgrab_telegram_send_failures_total",
        "Telegram messages that failed to send",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator / Store Metrics (collected dynamically)
// =============================================================================

/// Whether a run is in progress (1 = running, 0 = idle).
pub static RUN_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tokgrab_run_active",
        "Whether a download run is in progress (1) or not (0)",
    )
    .unwrap()
});

/// Acquisitions currently in flight.
pub static ACQUISITIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tokgrab_acquisitions_in_flight",
        "Number of acquisitions currently in flight",
    )
    .unwrap()
});

/// Stored download rows by status.
pub static DOWNLOADS_RECORDED: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("tokgrab_downloads_recorded", "Stored download records by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Telegram
    registry
        .register(Box::new(TELEGRAM_UPDATES.clone()))
        .unwrap();
    registry
        .register(Box::new(TELEGRAM_SEND_FAILURES.clone()))
        .unwrap();

    // Orchestrator / store
    registry.register(Box::new(RUN_ACTIVE.clone())).unwrap();
    registry
        .register(Box::new(ACQUISITIONS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOADS_RECORDED.clone()))
        .unwrap();

    // Core metrics (items, attempts, retries, sessions)
    for metric in tokgrab_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the orchestrator and the
/// store at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status().await;
    RUN_ACTIVE.set(if status.running { 1 } else { 0 });
    ACQUISITIONS_IN_FLIGHT.set(status.in_flight as i64);

    match state.store().stats() {
        Ok(stats) => {
            DOWNLOADS_RECORDED
                .with_label_values(&["success"])
                .set(stats.success_count as i64);
            DOWNLOADS_RECORDED
                .with_label_values(&["failed"])
                .set(stats.failed_count as i64);
        }
        Err(e) => error!("Failed to read download stats for metrics: {}", e),
    }
}

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

static HANDLE_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/@[^/]+").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = HANDLE_SEGMENT.replace_all(path, "/{handle}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
