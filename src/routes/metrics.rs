use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and register the render job metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    ::metrics::describe_counter!(
        "render_jobs_submitted_total",
        "Total render jobs submitted"
    );
    ::metrics::describe_counter!(
        "render_jobs_succeeded_total",
        "Render jobs whose renderer exited within the deadline"
    );
    ::metrics::describe_counter!(
        "render_jobs_failed_total",
        "Render jobs that ended in the error state"
    );
    ::metrics::describe_counter!(
        "render_jobs_timed_out_total",
        "Render jobs terminated for exceeding the deadline"
    );
    ::metrics::describe_histogram!(
        "render_job_duration_seconds",
        "Wall-clock time from dispatch to terminal state"
    );
    ::metrics::describe_gauge!("render_jobs_running", "Render jobs currently in flight");

    Ok(handle)
}

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
