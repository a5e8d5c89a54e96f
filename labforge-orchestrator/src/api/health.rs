//! Health Check API Handler
//!
//! Simple health check endpoint for monitoring.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub jobs: usize,
    pub prewarmed: bool,
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        jobs: state.jobs.list().await.len(),
        prewarmed: state.jobs.driver().is_prewarmed(),
    })
}
