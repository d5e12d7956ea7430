use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::services::runner::RenderRunner;
use crate::services::store::{JobError, JobStore};

/// Accepts render payloads and runs each one on its own supervised task.
///
/// Every job gets a supervisor that awaits the runner's join handle, so a
/// runner that panics still leaves its job in a terminal state. All
/// supervisors are tracked, which lets [`JobSubmitter::shutdown`] cancel
/// in-flight renders and wait for them to resolve.
pub struct JobSubmitter {
    store: Arc<JobStore>,
    runner: Arc<RenderRunner>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl JobSubmitter {
    pub fn new(store: Arc<JobStore>, runner: Arc<RenderRunner>) -> Self {
        Self {
            store,
            runner,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register a job and start rendering it in the background. Returns as
    /// soon as the job is registered.
    pub fn submit(&self, payload: Bytes) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        self.store.create(id)?;

        metrics::counter!("render_jobs_submitted_total").increment(1);
        metrics::gauge!("render_jobs_running").increment(1.0);
        info!(job_id = %id, payload_bytes = payload.len(), "Render job submitted");

        let runner = self.runner.clone();
        let cancel = self.cancel.child_token();
        self.track(id, async move { runner.run(id, payload, cancel).await });

        Ok(id)
    }

    /// Run a job's future under a tracked supervisor.
    fn track<F>(&self, id: Uuid, run: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(supervise(self.store.clone(), id, run));
    }

    /// Number of jobs whose supervisor has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work, cancel running renders and wait up to `grace` for
    /// their jobs to resolve. Returns `false` if the grace period ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        self.cancel.cancel();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("All render jobs resolved");
                true
            }
            Err(_) => {
                warn!(
                    in_flight = self.tracker.len(),
                    "Shutdown grace period elapsed with render jobs still running"
                );
                false
            }
        }
    }
}

/// Await a job's task and record an `Error` if it died without reaching a
/// terminal state.
async fn supervise<F>(store: Arc<JobStore>, id: Uuid, run: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Err(e) = tokio::spawn(run).await {
        error!(job_id = %id, error = %e, "Render task aborted");
        // The runner died before writing, so the supervisor is the only writer left.
        if store.get(id).is_ok_and(|job| !job.status().is_terminal()) {
            store.complete_error(id, format!("Internal error: {e}"));
        }
    }
    metrics::gauge!("render_jobs_running").decrement(1.0);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use crate::services::artifact::ArtifactLayout;
    use crate::services::runner::RenderSettings;
    use std::path::Path;
    use std::time::Instant;

    fn submitter(dir: &Path, script: &str) -> (JobSubmitter, Arc<JobStore>) {
        let settings = RenderSettings {
            command: vec!["sh".into(), "-c".into(), script.into(), "sh".into()],
            input_dir: dir.to_path_buf(),
            input_suffix: ".sh".to_string(),
            timeout: Duration::from_secs(60),
            terminate_grace: Duration::from_secs(1),
            layout: ArtifactLayout {
                media_root: dir.join("media"),
                public_base_url: "http://localhost:8000".to_string(),
                resolution_profile: "1080p60".to_string(),
                entry_symbol: "MainScene".to_string(),
                extension: "mp4".to_string(),
            },
        };
        let store = Arc::new(JobStore::new());
        let runner = Arc::new(RenderRunner::new(settings, store.clone()));
        (JobSubmitter::new(store.clone(), runner), store)
    }

    #[tokio::test]
    async fn test_submit_returns_before_render_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let (submitter, store) = submitter(dir.path(), "sleep 5");

        let start = Instant::now();
        let id = submitter.submit(Bytes::from_static(b"")).unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(store.get(id).unwrap().status(), JobStatus::Running);
        assert_eq!(submitter.in_flight(), 1);

        assert!(submitter.shutdown(Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (submitter, store) = submitter(dir.path(), "sleep 30");

        let ids: Vec<Uuid> = (0..3)
            .map(|_| submitter.submit(Bytes::from_static(b"")).unwrap())
            .collect();

        assert!(submitter.shutdown(Duration::from_secs(10)).await);
        assert_eq!(submitter.in_flight(), 0);
        for id in ids {
            let job = store.get(id).unwrap();
            assert_eq!(job.status(), JobStatus::Error);
            assert_eq!(job.error_message(), Some("Execution cancelled: service shutting down"));
        }
    }

    #[tokio::test]
    async fn test_panicking_job_task_is_recorded_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let (submitter, store) = submitter(dir.path(), "true");
        let id = Uuid::new_v4();
        store.create(id).unwrap();

        submitter.track(id, async { panic!("renderer state corrupted") });

        assert!(submitter.shutdown(Duration::from_secs(5)).await);
        assert_eq!(submitter.in_flight(), 0);
        let job = store.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Error);
        let message = job.error_message().unwrap();
        assert!(message.starts_with("Internal error"), "{message}");
        assert!(message.contains("panicked"), "{message}");
    }

    #[tokio::test]
    async fn test_supervisor_leaves_terminal_jobs_untouched() {
        let store = Arc::new(JobStore::new());
        let id = Uuid::new_v4();
        store.create(id).unwrap();
        let writer = store.clone();

        supervise(store.clone(), id, async move {
            writer.complete_error(id, "Execution timed out after 1 seconds");
            panic!("after terminal write");
        })
        .await;

        assert_eq!(
            store.get(id).unwrap().error_message(),
            Some("Execution timed out after 1 seconds")
        );
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (submitter, _store) = submitter(dir.path(), "true");

        let mut ids: Vec<Uuid> = (0..20)
            .map(|_| submitter.submit(Bytes::from_static(b"")).unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);

        assert!(submitter.shutdown(Duration::from_secs(10)).await);
    }
}
