use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::services::{
    projector::JobProjector,
    runner::{RenderRunner, RenderSettings},
    store::JobStore,
    submitter::JobSubmitter,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub submitter: Arc<JobSubmitter>,
    pub projector: JobProjector,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: RenderSettings) -> Self {
        let store = Arc::new(JobStore::new());
        let runner = Arc::new(RenderRunner::new(settings, store.clone()));

        Self {
            submitter: Arc::new(JobSubmitter::new(store.clone(), runner)),
            projector: JobProjector::new(store.clone()),
            store,
            started_at: Instant::now(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(RenderSettings::from_config(config))
    }
}
