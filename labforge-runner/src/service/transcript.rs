//! Job transcript sink
//!
//! Forwards engine progress into the job's output log through the job
//! repository, one append per line, so lines land in emission order.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::ProgressSink;
use crate::repository::JobRepository;

/// [`ProgressSink`] appending to one job's transcript
#[derive(Clone)]
pub struct Transcript {
    jobs: Arc<dyn JobRepository>,
    job_id: Uuid,
}

impl Transcript {
    pub fn new(jobs: Arc<dyn JobRepository>, job_id: Uuid) -> Self {
        Self { jobs, job_id }
    }

    /// Appends a line prefixed as a warning
    pub async fn warning(&self, message: impl std::fmt::Display) {
        warn!("Job {}: {}", self.job_id, message);
        self.line(format!("Warning: {}", message)).await;
    }
}

#[async_trait]
impl ProgressSink for Transcript {
    async fn line(&self, line: String) {
        debug!("[{}] {}", self.job_id, line);
        if let Err(e) = self.jobs.append_output(self.job_id, line).await {
            warn!("Failed to append output to job {}: {:#}", self.job_id, e);
        }
    }
}
