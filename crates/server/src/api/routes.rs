use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, records, runs, scrape, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Download runs
        .route("/runs", post(runs::start_run))
        .route("/runs/status", get(runs::get_status))
        .route("/runs/cancel", post(runs::cancel_run))
        .route("/runs/last", get(runs::get_last_result))
        // Stored records
        .route("/stats", get(records::get_stats))
        .route("/downloads", get(records::list_downloads))
        .route("/downloads/{video_id}", get(records::get_download))
        // Profile discovery
        .route("/scrape", post(scrape::scrape_profile))
        // Live run events
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
