//! Jobs repository
//!
//! Operations the driver performs on a job record:
//! - Reading the configuration snapshot
//! - Starting an operation and moving the job through its state machine
//! - Appending transcript lines
//! - Recording failures and results
//! - Requesting a durable snapshot

use anyhow::Result;
use async_trait::async_trait;
use labforge_core::domain::job::{Job, JobOperation, JobStatus};
use labforge_core::domain::outputs::LabOutputs;
use uuid::Uuid;

/// Repository trait for job record access
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Returns a copy of the job record
    ///
    /// # Arguments
    /// * `job_id` - The ID of the job
    async fn job(&self, job_id: Uuid) -> Result<Job>;

    /// Moves the job to `running` and records the operation being started
    ///
    /// Clears the previous error message; the transcript is kept.
    ///
    /// # Arguments
    /// * `job_id` - The ID of the job
    /// * `operation` - Operation the driver is about to run
    async fn begin(&self, job_id: Uuid, operation: JobOperation) -> Result<()>;

    /// Updates the job status
    ///
    /// Fails for transitions the state machine does not allow, including any
    /// transition to `failed`; use [`JobRepository::set_error`] for that.
    ///
    /// # Arguments
    /// * `job_id` - The ID of the job to update
    /// * `status` - The new status
    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<()>;

    /// Appends one line to the job transcript
    async fn append_output(&self, job_id: Uuid, line: String) -> Result<()>;

    /// Records a failure and moves the job to `failed`
    ///
    /// # Arguments
    /// * `job_id` - The ID of the failed job
    /// * `error` - Human readable failure message
    async fn set_error(&self, job_id: Uuid, error: String) -> Result<()>;

    /// Stores the lab result fields
    async fn set_result(&self, job_id: Uuid, outputs: LabOutputs) -> Result<()>;

    /// Writes the job to durable storage when its status allows it
    ///
    /// A no-op when persistence is disabled or the job is not terminal.
    async fn persist(&self, job_id: Uuid) -> Result<()>;
}
