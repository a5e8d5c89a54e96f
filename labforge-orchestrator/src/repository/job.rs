//! Job Registry
//!
//! In-memory map of job id to job record. The map sits behind a registry
//! level lock that is only held for membership operations; each record has
//! its own reader/writer lock. The registry lock is always released before
//! a record lock is taken, so the two are never nested.

use async_trait::async_trait;
use chrono::Utc;
use labforge_core::domain::job::{Job, JobOperation, JobStatus};
use labforge_core::domain::lab::LabConfig;
use labforge_core::domain::outputs::LabOutputs;
use labforge_runner::repository::JobRepository;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::repository::snapshot::SnapshotStore;

/// Registry error type
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} is {status}, cannot {operation}")]
    InvalidState {
        id: Uuid,
        status: JobStatus,
        operation: String,
    },

    #[error("Failed to persist job {id}: {source}")]
    Persistence {
        id: Uuid,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize job: {0}")]
    Serialization(#[from] serde_json::Error),
}

type Record = Arc<RwLock<Job>>;

/// Concurrent job registry with optional snapshot persistence
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Record>>,
    store: Option<SnapshotStore>,
}

impl JobRegistry {
    /// Creates a registry
    ///
    /// # Arguments
    /// * `store` - Snapshot store; `None` disables persistence
    pub fn new(store: Option<SnapshotStore>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Creates a registry without persistence
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Looks up a record, releasing the registry lock before returning
    async fn record(&self, id: Uuid) -> Result<Record, RegistryError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Mutates a record under its write lock and refreshes `updated_at`
    async fn mutate<T, F>(&self, id: Uuid, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut Job) -> Result<T, RegistryError>,
    {
        let record = self.record(id).await?;
        let mut job = record.write().await;
        let value = f(&mut job)?;
        job.updated_at = Utc::now();
        Ok(value)
    }

    // ============================================================================
    // Membership
    // ============================================================================

    /// Stores a new pending job and returns its id
    pub async fn create(&self, config: LabConfig) -> Uuid {
        let job = Job::new(config);
        let id = job.id;

        self.jobs
            .write()
            .await
            .insert(id, Arc::new(RwLock::new(job)));

        debug!("Created job {}", id);
        id
    }

    /// Returns a copy of a job
    pub async fn get(&self, id: Uuid) -> Option<Job> {
        let record = self.record(id).await.ok()?;
        let job = record.read().await;
        Some(job.clone())
    }

    /// Returns every job, most recently created first
    pub async fn list(&self) -> Vec<Job> {
        let records: Vec<Record> = self.jobs.read().await.values().cloned().collect();

        let mut jobs = Vec::with_capacity(records.len());
        for record in records {
            jobs.push(record.read().await.clone());
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Deletes a job and its snapshot
    pub async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        self.jobs
            .write()
            .await
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))?;

        if let Some(store) = &self.store {
            store.delete(id).await?;
        }

        info!("Removed job {}", id);
        Ok(())
    }

    // ============================================================================
    // Record mutation
    // ============================================================================

    /// Moves a job to a new status
    ///
    /// Only transitions allowed by [`JobStatus::can_transition_to`] are
    /// accepted; `failed` is reached through [`JobRegistry::set_error`].
    pub async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<(), RegistryError> {
        self.mutate(id, |job| {
            if !job.status.can_transition_to(status) {
                return Err(RegistryError::InvalidState {
                    id,
                    status: job.status,
                    operation: format!("move to {}", status),
                });
            }
            job.status = status;
            Ok(())
        })
        .await?;

        debug!("Job {} is now {}", id, status);
        Ok(())
    }

    /// Moves a job to `running` and records the operation it runs
    ///
    /// The previous error is cleared; the transcript is kept.
    pub async fn begin(&self, id: Uuid, operation: JobOperation) -> Result<(), RegistryError> {
        self.mutate(id, |job| {
            if !job.status.can_transition_to(JobStatus::Running) {
                return Err(RegistryError::InvalidState {
                    id,
                    status: job.status,
                    operation: operation.to_string(),
                });
            }
            job.status = JobStatus::Running;
            job.error = None;
            job.last_operation = Some(operation);
            Ok(())
        })
        .await?;

        debug!("Job {} is running {}", id, operation);
        Ok(())
    }

    /// Appends one line to a job's transcript
    pub async fn append_output(&self, id: Uuid, line: String) -> Result<(), RegistryError> {
        self.mutate(id, |job| {
            job.output.push(line);
            Ok(())
        })
        .await
    }

    /// Records an error and moves the job to `failed` in one step
    ///
    /// Only a running job can fail.
    pub async fn set_error(&self, id: Uuid, error: String) -> Result<(), RegistryError> {
        let error = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        };

        self.mutate(id, |job| {
            if !job.status.can_fail() {
                return Err(RegistryError::InvalidState {
                    id,
                    status: job.status,
                    operation: "record a failure".to_string(),
                });
            }
            job.status = JobStatus::Failed;
            job.error = Some(error);
            Ok(())
        })
        .await?;

        debug!("Job {} failed", id);
        Ok(())
    }

    /// Stores a job's result fields
    pub async fn set_result(&self, id: Uuid, outputs: LabOutputs) -> Result<(), RegistryError> {
        self.mutate(id, |job| {
            job.outputs = outputs;
            Ok(())
        })
        .await
    }

    /// Returns a failed job to `pending` for another attempt
    ///
    /// Clears the error, the transcript and the result fields. Fails without
    /// touching the job when it is not `failed`.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<(), RegistryError> {
        self.mutate(id, |job| {
            if job.status != JobStatus::Failed {
                return Err(RegistryError::InvalidState {
                    id,
                    status: job.status,
                    operation: "retry".to_string(),
                });
            }
            job.status = JobStatus::Pending;
            job.error = None;
            job.output.clear();
            job.outputs = LabOutputs::default();
            Ok(())
        })
        .await?;

        info!("Job {} reset for retry", id);
        Ok(())
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    /// Writes a snapshot of a terminal job
    ///
    /// A no-op when persistence is disabled or the job's status is not
    /// persistable.
    pub async fn persist(&self, id: Uuid) -> Result<(), RegistryError> {
        let record = self.record(id).await?;
        let Some(store) = &self.store else {
            return Ok(());
        };

        let job = record.read().await.clone();
        if !job.status.is_persistable() {
            debug!("Not persisting job {} in status {}", id, job.status);
            return Ok(());
        }

        store.save(&job).await
    }

    /// Loads persisted jobs into the registry
    ///
    /// Jobs already present are kept. Snapshots in a non-terminal status are
    /// skipped.
    ///
    /// # Returns
    /// Number of jobs loaded
    pub async fn reload(&self) -> Result<usize, RegistryError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let snapshots = store
            .load_all()
            .await
            .map_err(|source| RegistryError::Persistence {
                id: Uuid::nil(),
                source,
            })?;

        let mut jobs = self.jobs.write().await;
        let mut loaded = 0;
        for job in snapshots {
            if !job.status.is_persistable() {
                warn!("Skipping snapshot of job {} in status {}", job.id, job.status);
                continue;
            }
            if jobs.contains_key(&job.id) {
                continue;
            }
            jobs.insert(job.id, Arc::new(RwLock::new(job)));
            loaded += 1;
        }

        info!("Reloaded {} job(s) from {}", loaded, store.dir().display());
        Ok(loaded)
    }
}

#[async_trait]
impl JobRepository for JobRegistry {
    async fn job(&self, job_id: Uuid) -> anyhow::Result<Job> {
        Ok(self.get(job_id).await.ok_or(RegistryError::NotFound(job_id))?)
    }

    async fn begin(&self, job_id: Uuid, operation: JobOperation) -> anyhow::Result<()> {
        Ok(JobRegistry::begin(self, job_id, operation).await?)
    }

    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> anyhow::Result<()> {
        Ok(JobRegistry::update_status(self, job_id, status).await?)
    }

    async fn append_output(&self, job_id: Uuid, line: String) -> anyhow::Result<()> {
        Ok(JobRegistry::append_output(self, job_id, line).await?)
    }

    async fn set_error(&self, job_id: Uuid, error: String) -> anyhow::Result<()> {
        Ok(JobRegistry::set_error(self, job_id, error).await?)
    }

    async fn set_result(&self, job_id: Uuid, outputs: LabOutputs) -> anyhow::Result<()> {
        Ok(JobRegistry::set_result(self, job_id, outputs).await?)
    }

    async fn persist(&self, job_id: Uuid) -> anyhow::Result<()> {
        Ok(JobRegistry::persist(self, job_id).await?)
    }
}
