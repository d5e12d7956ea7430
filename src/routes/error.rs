use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::store::JobError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    /// Id that is not even well formed, so no job can carry it.
    #[error("Execution not found: {0}")]
    MalformedId(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Job(JobError::NotFound(_)) | ApiError::MalformedId(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Job(JobError::InvalidState { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Job(JobError::AlreadyExists(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
