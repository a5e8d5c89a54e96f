//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod credentials;
pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router,
    routing::{get, post},
};
use labforge_runner::repository::CredentialStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::job_service::JobService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/job", post(job::create_job))
        .route("/job/list", get(job::list_jobs))
        .route("/job/{id}", get(job::get_job).delete(job::delete_job))
        .route("/job/{id}/output", get(job::get_job_output))
        .route("/job/{id}/preview", post(job::preview_job))
        .route("/job/{id}/apply", post(job::apply_job))
        .route("/job/{id}/launch", post(job::launch_job))
        .route("/job/{id}/retry", post(job::retry_job))
        .route("/job/{id}/destroy", post(job::destroy_job))
        .route("/job/{id}/recreate", post(job::recreate_job))
        // Credential endpoints
        .route(
            "/credentials/{provider}",
            get(credentials::get_credentials).put(credentials::set_credentials),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
