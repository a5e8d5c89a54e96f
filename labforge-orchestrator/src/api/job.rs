//! Job API Handlers
//!
//! HTTP endpoints for job lifecycle management. Jobs are redacted before
//! they leave the process.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use labforge_core::domain::job::Job;
use labforge_core::dto::job::{CreateJob, JobOutput, JobSummary};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

// =============================================================================
// Job Lifecycle Endpoints
// =============================================================================

/// POST /job
/// Create a job, optionally starting a preview or apply
pub async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    tracing::info!("Creating job for stack: {}", req.config.stack_name);

    let job = state.jobs.create(req.config, req.start).await?;
    Ok((StatusCode::CREATED, Json(job.redacted())))
}

/// GET /job/list
/// List all jobs, most recent first
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    tracing::debug!("Listing jobs");

    let jobs = state.jobs.list().await;
    Json(jobs.iter().map(JobSummary::from).collect())
}

/// GET /job/{id}
/// Get job details by ID
pub async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting job: {}", id);

    let job = state.jobs.get(id).await?;
    Ok(Json(job.redacted()))
}

/// GET /job/{id}/output
/// Get a job's transcript
pub async fn get_job_output(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobOutput>> {
    Ok(Json(state.jobs.output(id).await?))
}

/// DELETE /job/{id}
/// Delete a job record
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting job: {}", id);

    state.jobs.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Driver Operations
// =============================================================================

/// POST /job/{id}/preview
pub async fn preview_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.preview(id).await?)
}

/// POST /job/{id}/apply
pub async fn apply_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.apply(id).await?)
}

/// POST /job/{id}/launch
/// Apply a job whose dry run completed
pub async fn launch_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.launch(id).await?)
}

/// POST /job/{id}/retry
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.retry(id).await?)
}

/// POST /job/{id}/destroy
pub async fn destroy_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.destroy(id).await?)
}

/// POST /job/{id}/recreate
/// Create and apply a new job from a destroyed job's configuration
pub async fn recreate_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    accepted(state.jobs.recreate(id).await?)
}

fn accepted(job: Job) -> ApiResult<(StatusCode, Json<Job>)> {
    Ok((StatusCode::ACCEPTED, Json(job.redacted())))
}
