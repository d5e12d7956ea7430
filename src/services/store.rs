use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{Job, JobState, JobStatus, RenderResult};

/// In-memory registry of every job submitted during the process lifetime.
///
/// Entries are never evicted. Each entry has exactly one writer (its runner),
/// so a single map-wide lock held for the duration of a lookup or a state swap
/// is enough.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

/// Per-status job counts, reported by the health endpoint.
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    pub running: usize,
    pub success: usize,
    pub error: usize,
    pub total: usize,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the `Running` state.
    pub fn create(&self, id: Uuid) -> Result<(), JobError> {
        let mut jobs = self.write();
        if jobs.contains_key(&id) {
            return Err(JobError::AlreadyExists(id));
        }
        jobs.insert(id, Job::new(id));
        Ok(())
    }

    /// Snapshot of a job's current state.
    pub fn get(&self, id: Uuid) -> Result<Job, JobError> {
        self.read().get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    pub fn complete_success(&self, id: Uuid, result: RenderResult) {
        self.finish(id, JobState::Success(result));
    }

    pub fn complete_error(&self, id: Uuid, message: impl Into<String>) {
        self.finish(id, JobState::Error(message.into()));
    }

    pub fn stats(&self) -> StoreStats {
        let jobs = self.read();
        let mut stats = StoreStats {
            total: jobs.len(),
            ..StoreStats::default()
        };
        for job in jobs.values() {
            match job.status() {
                JobStatus::Running => stats.running += 1,
                JobStatus::Success => stats.success += 1,
                JobStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    /// One-time terminal transition. The runner is the sole writer of its job,
    /// so finishing an unknown or already terminal job is a bug.
    fn finish(&self, id: Uuid, state: JobState) {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(&id)
            .unwrap_or_else(|| panic!("job {id} finished without being registered"));
        assert!(
            !job.status().is_terminal(),
            "job {id} finished twice (already {})",
            job.status()
        );
        job.state = state;
        job.finished_at = Some(Utc::now());
    }

    // A panicking writer cannot leave an entry half-updated (the state is
    // swapped in a single assignment), so poisoning is safe to ignore.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Execution not found: {0}")]
    NotFound(Uuid),

    #[error("Execution already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("Execution is not completed successfully. Current status: {status}")]
    InvalidState { status: JobStatus },
}
