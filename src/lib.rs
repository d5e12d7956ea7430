//! Render job service
//!
//! Accepts arbitrary script payloads, renders each one into a video with an
//! external renderer process, and lets clients poll for the outcome.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use app_state::AppState;
use config::AppConfig;

/// Job routes plus the read-only media mount and, when a recorder handle is
/// given, the `/metrics` scrape endpoint. Every route sits behind the standard
/// middleware stack.
pub fn build_router(
    state: AppState,
    config: &AppConfig,
    metrics: Option<Arc<PrometheusHandle>>,
) -> Router {
    let mut app = Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/execute", post(routes::render::start_execution))
        .route("/status/{execution_id}", get(routes::render::get_status))
        .route("/response/{execution_id}", get(routes::render::get_response))
        .with_state(state);

    if let Some(handle) = metrics {
        app = app.route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(handle),
        );
    }

    if config.serve_media {
        app = app.nest_service("/media", ServeDir::new(&config.media_dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_payload_bytes))
}
