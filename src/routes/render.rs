use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::render::{ExecutionResponse, ResultResponse, StatusResponse};
use crate::routes::error::{ApiError, ApiResult};

/// POST /execute — Queue the raw request body for rendering.
pub async fn start_execution(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ExecutionResponse>)> {
    let execution_id = state.submitter.submit(body)?;
    Ok((StatusCode::ACCEPTED, Json(ExecutionResponse { execution_id })))
}

/// GET /status/{execution_id} — Current lifecycle status of a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let id = parse_id(&execution_id)?;
    Ok(Json(state.projector.status(id)?))
}

/// GET /response/{execution_id} — Renderer output of a successful job.
pub async fn get_response(
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Json<ResultResponse>> {
    let id = parse_id(&execution_id)?;
    Ok(Json(state.projector.result(id)?))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::MalformedId(raw.to_string()))
}
