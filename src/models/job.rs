use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a render job as seen by polling clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Captured outcome of a renderer process that exited within its deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub artifact_url: String,
}

/// Lifecycle state of a job. The payload of each terminal variant is only
/// reachable through that variant, so a result and an error message can never
/// coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Success(RenderResult),
    Error(String),
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Running => JobStatus::Running,
            JobState::Success(_) => JobStatus::Success,
            JobState::Error(_) => JobStatus::Error,
        }
    }
}

/// A render job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: JobState::Running,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn result(&self) -> Option<&RenderResult> {
        match &self.state {
            JobState::Success(result) => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            JobState::Error(message) => Some(message),
            _ => None,
        }
    }
}
