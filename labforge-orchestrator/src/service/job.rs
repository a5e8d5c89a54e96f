//! Job Service
//!
//! Lifecycle operations on top of the registry. Each operation validates
//! the job's state synchronously, then hands the long-running work to the
//! execution driver on a background task. Callers get the job back as soon
//! as the operation is accepted and follow progress through the transcript.

use labforge_core::domain::job::{Job, JobOperation, JobStatus};
use labforge_core::domain::lab::{LabConfig, Provider};
use labforge_core::dto::job::{JobOutput, StartMode};
use labforge_runner::ExecutionDriver;
use labforge_runner::repository::CredentialStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repository::{JobRegistry, RegistryError};

/// Service error type
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for JobError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => JobError::NotFound(id),
            err @ RegistryError::InvalidState { .. } => JobError::InvalidState(err.to_string()),
            err => JobError::Registry(err),
        }
    }
}

/// Driver operation run on a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Preview,
    Apply,
    Launch,
    Retry,
    Destroy,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Preview => "preview",
            Operation::Apply => "apply",
            Operation::Launch => "launch",
            Operation::Retry => "retry",
            Operation::Destroy => "destroy",
        }
    }

    /// Statuses a job may be in for the operation to be accepted
    fn accepts(self, status: JobStatus) -> bool {
        match self {
            Operation::Preview | Operation::Apply => status == JobStatus::Pending,
            Operation::Launch => status == JobStatus::DryRunCompleted,
            Operation::Retry => status == JobStatus::Failed,
            Operation::Destroy => matches!(status, JobStatus::Completed | JobStatus::Failed),
        }
    }
}

impl From<StartMode> for Operation {
    fn from(mode: StartMode) -> Self {
        match mode {
            StartMode::Preview => Operation::Preview,
            StartMode::Apply => Operation::Apply,
        }
    }
}

/// Job lifecycle service
pub struct JobService {
    registry: Arc<JobRegistry>,
    driver: Arc<ExecutionDriver>,
    credentials: Arc<dyn CredentialStore>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl JobService {
    /// Creates a new job service
    ///
    /// # Arguments
    /// * `registry` - Job records
    /// * `driver` - Execution driver writing to the same registry
    /// * `credentials` - Credential store shared with the driver
    pub fn new(
        registry: Arc<JobRegistry>,
        driver: Arc<ExecutionDriver>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            registry,
            driver,
            credentials,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn driver(&self) -> &Arc<ExecutionDriver> {
        &self.driver
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get a job by ID
    pub async fn get(&self, id: Uuid) -> Result<Job, JobError> {
        self.registry.get(id).await.ok_or(JobError::NotFound(id))
    }

    /// List all jobs, most recent first
    pub async fn list(&self) -> Vec<Job> {
        self.registry.list().await
    }

    /// Get a job's transcript
    pub async fn output(&self, id: Uuid) -> Result<JobOutput, JobError> {
        let job = self.get(id).await?;
        Ok(JobOutput {
            id: job.id,
            status: job.status,
            lines: job.output,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a job, optionally starting its first operation
    pub async fn create(&self, config: LabConfig, start: Option<StartMode>) -> Result<Job, JobError> {
        config.validate().map_err(JobError::Validation)?;

        if start.is_some() {
            self.require_credentials(&config).await?;
        }

        let id = self.registry.create(config).await;
        info!("Job {} created", id);

        match start {
            Some(mode) => self.dispatch(id, mode.into()).await,
            None => self.get(id).await,
        }
    }

    /// Run a dry run on a pending job
    pub async fn preview(&self, id: Uuid) -> Result<Job, JobError> {
        self.dispatch(id, Operation::Preview).await
    }

    /// Provision a pending job
    pub async fn apply(&self, id: Uuid) -> Result<Job, JobError> {
        self.dispatch(id, Operation::Apply).await
    }

    /// Provision a job whose dry run completed
    pub async fn launch(&self, id: Uuid) -> Result<Job, JobError> {
        self.dispatch(id, Operation::Launch).await
    }

    /// Reset a failed job and provision it again
    pub async fn retry(&self, id: Uuid) -> Result<Job, JobError> {
        self.dispatch(id, Operation::Retry).await
    }

    /// Tear down a provisioned or failed job's infrastructure
    pub async fn destroy(&self, id: Uuid) -> Result<Job, JobError> {
        self.dispatch(id, Operation::Destroy).await
    }

    /// Create a new job from a destroyed job's configuration and apply it
    pub async fn recreate(&self, id: Uuid) -> Result<Job, JobError> {
        let previous = self.get(id).await?;
        if previous.status != JobStatus::Destroyed {
            return Err(JobError::InvalidState(format!(
                "Job {} is {}, only destroyed jobs can be recreated",
                id, previous.status
            )));
        }

        self.require_credentials(&previous.config).await?;

        let new_id = self.registry.create(previous.config).await;
        info!("Job {} recreated as {}", id, new_id);
        self.dispatch(new_id, Operation::Apply).await
    }

    /// Delete a job record and its snapshot
    ///
    /// The job's infrastructure is left untouched.
    pub async fn remove(&self, id: Uuid) -> Result<(), JobError> {
        let job = self.get(id).await?;
        if job.status == JobStatus::Running || self.is_in_flight(id) {
            return Err(JobError::InvalidState(format!(
                "Job {} has an operation in progress",
                id
            )));
        }

        self.registry.remove(id).await?;
        Ok(())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Validates an operation and runs it on a background task
    async fn dispatch(&self, id: Uuid, operation: Operation) -> Result<Job, JobError> {
        if !self.claim(id) {
            return Err(JobError::InvalidState(format!(
                "Job {} has an operation in progress",
                id
            )));
        }

        let operation = match self.accept(id, operation).await {
            Ok(operation) => operation,
            Err(e) => {
                self.release(id);
                return Err(e);
            }
        };

        info!("Starting {} of job {}", operation.name(), id);

        let driver = self.driver.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let result = match operation {
                Operation::Preview => driver.preview(id).await,
                Operation::Apply => driver.apply(id).await,
                Operation::Launch => driver.launch(id).await,
                Operation::Retry => driver.retry(id).await,
                Operation::Destroy => driver.destroy(id).await,
            };

            if let Err(e) = result {
                warn!("{} of job {} failed: {}", operation.name(), id, e);
            }

            if let Ok(mut ids) = in_flight.lock() {
                ids.remove(&id);
            }
        });

        self.get(id).await
    }

    /// Checks state and credentials and resolves the operation to run
    ///
    /// Every operation needs credentials, destroy included. A retry of a
    /// failed destroy runs the destroy again with its transcript and results
    /// kept; any other failed job is reset and applied again.
    async fn accept(&self, id: Uuid, operation: Operation) -> Result<Operation, JobError> {
        let job = self.get(id).await?;

        if !operation.accepts(job.status) {
            return Err(JobError::InvalidState(format!(
                "Cannot {} job {} in status {}",
                operation.name(),
                id,
                job.status
            )));
        }

        self.require_credentials(&job.config).await?;

        if operation != Operation::Retry {
            return Ok(operation);
        }

        if job.last_operation == Some(JobOperation::Destroy) {
            info!("Job {} failed while being destroyed, destroying again", id);
            return Ok(Operation::Destroy);
        }

        self.registry.reset_for_retry(id).await?;
        Ok(Operation::Retry)
    }

    async fn require_credentials(&self, config: &LabConfig) -> Result<(), JobError> {
        if config.credentials.is_some() || self.credentials.get(Provider::Ovh).await.is_ok() {
            return Ok(());
        }

        Err(JobError::ConfigurationMissing(format!(
            "Credentials for provider '{}' are not configured",
            Provider::Ovh
        )))
    }

    fn claim(&self, id: Uuid) -> bool {
        match self.in_flight.lock() {
            Ok(mut ids) => ids.insert(id),
            Err(_) => false,
        }
    }

    fn release(&self, id: Uuid) {
        if let Ok(mut ids) = self.in_flight.lock() {
            ids.remove(&id);
        }
    }

    fn is_in_flight(&self, id: Uuid) -> bool {
        self.in_flight
            .lock()
            .map(|ids| ids.contains(&id))
            .unwrap_or(false)
    }
}
