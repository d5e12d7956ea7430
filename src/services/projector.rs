use std::sync::Arc;

use uuid::Uuid;

use crate::models::render::{ResultResponse, StatusResponse};
use crate::services::store::{JobError, JobStore};

/// Read-only views of the job store for polling clients.
#[derive(Clone)]
pub struct JobProjector {
    store: Arc<JobStore>,
}

impl JobProjector {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self { store }
    }

    pub fn status(&self, id: Uuid) -> Result<StatusResponse, JobError> {
        let job = self.store.get(id)?;
        Ok(StatusResponse::from(&job))
    }

    /// Stored output of a successful job. Any other status is an `InvalidState`.
    pub fn result(&self, id: Uuid) -> Result<ResultResponse, JobError> {
        let job = self.store.get(id)?;
        match job.result() {
            Some(result) => Ok(ResultResponse::from(result.clone())),
            None => Err(JobError::InvalidState {
                status: job.status(),
            }),
        }
    }
}
