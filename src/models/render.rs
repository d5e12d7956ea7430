use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{Job, JobStatus, RenderResult};

/// Response after submitting a script for rendering.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution_id: Uuid,
}

/// Response for polling a job's status.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub video_url: Option<String>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status(),
            error_message: job.error_message().map(str::to_string),
            video_url: job.result().map(|r| r.artifact_url.clone()),
        }
    }
}

/// Full output of a successfully completed job.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResultResponse {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub video_url: String,
}

impl From<RenderResult> for ResultResponse {
    fn from(result: RenderResult) -> Self {
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            return_code: result.return_code,
            video_url: result.artifact_url,
        }
    }
}
