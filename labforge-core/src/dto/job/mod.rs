//! Job DTOs for the orchestrator API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::lab::LabConfig;

/// Request to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub config: LabConfig,
    /// Operation to start right after creation, none leaves the job pending
    #[serde(default)]
    pub start: Option<StartMode>,
}

/// Driver operation fired when a pending job is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    Preview,
    Apply,
}

/// Lightweight job summary for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub stack_name: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            stack_name: job.config.stack_name.clone(),
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            error: job.error.clone(),
        }
    }
}

/// Transcript of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
    pub id: Uuid,
    pub status: JobStatus,
    pub lines: Vec<String>,
}
