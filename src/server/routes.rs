//! Routes for the job status service.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::job::JobState;
use crate::relay;
use crate::upstream::GenerationRequest;

use super::error::ApiError;
use super::state::AppState;

/// Response body for job creation and status requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Wire status plus optional message for a job state. `Failed` and
/// `TimedOut` both surface as `error`; the message distinguishes them.
fn status_fields(state: &JobState) -> (&'static str, Option<String>) {
    match state {
        JobState::Queued => ("queued", None),
        JobState::Processing => ("processing", None),
        JobState::Ready { .. } => ("ready", None),
        JobState::Failed { message } => ("error", Some(message.clone())),
        JobState::TimedOut => ("error", Some("generation timed out".to_string())),
    }
}

/// Wire status for a freshly created job. Creation reports only `queued` or
/// `processing`; even an operation that came back already terminal is
/// observed through a follow-up status poll, never the creation response.
fn creation_status(state: &JobState) -> &'static str {
    match state {
        JobState::Queued => "queued",
        _ => "processing",
    }
}

/// POST /jobs
///
/// Reserves a slot under the concurrent-job cap, submits the upstream
/// operation synchronously (surfacing credential and request errors
/// immediately), spawns the job poller, and returns without waiting for
/// completion. A request refused at capacity never reaches upstream.
async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<(StatusCode, Json<JobStatusResponse>), ApiError> {
    log::info!("creating generation job for expression {:?}", request.expression);

    let slot = state.registry.reserve()?;
    let operation = state.client.submit(&request).await?;
    let job_id = state
        .registry
        .spawn(slot, state.client.clone(), operation, state.budget);

    let job_state = state.registry.status(&job_id).unwrap_or(JobState::Queued);

    Ok((
        StatusCode::ACCEPTED,
        Json(JobStatusResponse {
            job_id: job_id.to_string(),
            status: creation_status(&job_state),
            message: None,
        }),
    ))
}

/// GET /jobs/{job_id}
///
/// Never fails for a job whose poller is still running; reports `error` with
/// a message once the poller ends in failure or timeout.
async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job_state = state
        .registry
        .status(&job_id)
        .ok_or(ApiError::JobNotFound(job_id))?;
    let (status, message) = status_fields(&job_state);

    Ok(Json(JobStatusResponse {
        job_id: job_id.to_string(),
        status,
        message,
    }))
}

/// GET /jobs/{job_id}/stream
///
/// Valid once the job is ready. Each call re-fetches from upstream; the
/// media is never cached locally.
async fn stream_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    match state.registry.status(&job_id) {
        None => Err(ApiError::JobNotFound(job_id)),
        Some(JobState::Ready { uri }) => {
            log::info!("streaming job {} from upstream", job_id);
            Ok(relay::relay(&state.client, &uri).await?)
        }
        Some(_) => Err(ApiError::JobNotReady(job_id)),
    }
}

/// Returns the job status service router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_job))
        .route("/jobs/{job_id}", get(get_job_status))
        .route("/jobs/{job_id}/stream", get(stream_job))
}
