use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use render_jobs::{app_state::AppState, build_router, config::AppConfig, routes};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing render-jobs server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    std::fs::create_dir_all(&config.media_dir).expect("Failed to create media directory");
    if let Some(input_dir) = &config.input_dir {
        std::fs::create_dir_all(input_dir).expect("Failed to create input directory");
    }

    tracing::info!(
        command = ?config.render_command,
        media_dir = %config.media_dir.display(),
        timeout_secs = config.render_timeout_secs,
        "Renderer configured"
    );

    let state = AppState::from_config(&config);
    let submitter = state.submitter.clone();

    let app = build_router(state, &config, Some(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!(
        in_flight = submitter.in_flight(),
        "Server stopped, resolving in-flight render jobs"
    );
    submitter.shutdown(config.shutdown_grace()).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
