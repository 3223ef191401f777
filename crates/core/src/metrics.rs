//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Items processed by the orchestrator, by outcome
//! - Acquisition attempts and retries
//! - Browser session startups
//! - Run and acquisition durations

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator
// =============================================================================

/// Items finished, by media kind and outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tokgrab_items_processed_total", "Total items processed"),
        &["kind", "outcome"], // outcome: "success", "failed", "skipped"
    )
    .unwrap()
});

/// Runs started, by how they ended.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tokgrab_runs_total", "Total download runs"),
        &["result"], // "completed", "cancelled", "aborted"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tokgrab_run_duration_seconds", "Duration of a download run")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Acquisition
// =============================================================================

/// Individual acquisition attempts by result.
pub static ACQUISITION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tokgrab_acquisition_attempts_total",
            "Total acquisition attempts",
        ),
        &["kind", "result"], // result: "success", "no_new_file", "error"
    )
    .unwrap()
});

/// Acquisition duration in seconds, including retries.
pub static ACQUISITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tokgrab_acquisition_duration_seconds",
            "Duration of a retry-wrapped acquisition",
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["kind"],
    )
    .unwrap()
});

/// Retries scheduled after a failed attempt.
pub static RETRY_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tokgrab_retry_attempts_total", "Total retries scheduled").unwrap()
});

// =============================================================================
// Browser sessions
// =============================================================================

/// Session startups by result.
pub static SESSION_STARTUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tokgrab_session_startups_total",
            "Browser session startups",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(ACQUISITION_ATTEMPTS.clone()),
        Box::new(ACQUISITION_DURATION.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(SESSION_STARTUPS.clone()),
    ]
}
