//! Job domain types
//!
//! A job is one tracked attempt to preview, provision or destroy a lab.
//! The record is owned by the orchestrator's registry and mutated by the
//! runner's execution driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lab::LabConfig;
use crate::domain::outputs::LabOutputs;

/// Job record
///
/// Structure shared between orchestrator (stores, persists) and runner (updates).
/// Fields other than `id`, `status`, timestamps and `config` default when
/// missing so that older snapshots still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Append-only transcript of progress lines
    #[serde(default)]
    pub output: Vec<String>,
    /// Last failure message, cleared on retry
    #[serde(default)]
    pub error: Option<String>,
    /// Configuration snapshot the job was created from
    pub config: LabConfig,
    /// Cluster and platform results captured after a successful apply
    #[serde(default)]
    pub outputs: LabOutputs,
    /// Driver operation most recently started on the job
    #[serde(default)]
    pub last_operation: Option<JobOperation>,
}

impl Job {
    /// Creates a new pending job for the given configuration
    pub fn new(config: LabConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            output: Vec::new(),
            error: None,
            config,
            outputs: LabOutputs::default(),
            last_operation: None,
        }
    }

    /// Returns a copy with provider credentials and admin secrets masked
    ///
    /// Used whenever a job leaves the process over the API.
    pub fn redacted(&self) -> Self {
        let mut job = self.clone();
        job.config = job.config.redacted();
        job
    }
}

/// Job execution status
///
/// ```text
/// pending -> running -> completed | dry-run-completed | failed
/// completed | failed -> running      (retry, destroy)
/// dry-run-completed  -> running      (launch)
/// failed             -> pending      (reset for retry)
/// running            -> destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    DryRunCompleted,
    Failed,
    Destroyed,
}

impl JobStatus {
    /// Whether a job in this status is written to the snapshot store
    pub fn is_persistable(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Destroyed
        )
    }

    /// Whether no driver operation is in flight for this status
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Checks a transition against the job state machine
    ///
    /// `Failed` is only reachable through the registry's error path, which
    /// calls [`JobStatus::can_fail`] instead.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, DryRunCompleted)
                | (Running, Destroyed)
                | (Completed, Running)
                | (Failed, Running)
                | (Failed, Pending)
                | (DryRunCompleted, Running)
        )
    }

    /// Whether an error may be recorded against a job in this status
    ///
    /// Only a running job can fail; this also covers marking a stuck job
    /// as failed.
    pub fn can_fail(self) -> bool {
        self == JobStatus::Running
    }
}

/// Driver operation run against a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobOperation {
    Preview,
    Apply,
    Launch,
    Destroy,
}

impl std::fmt::Display for JobOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobOperation::Preview => "preview",
            JobOperation::Apply => "apply",
            JobOperation::Launch => "launch",
            JobOperation::Destroy => "destroy",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::DryRunCompleted => "dry-run-completed",
            JobStatus::Failed => "failed",
            JobStatus::Destroyed => "destroyed",
        };
        write!(f, "{}", s)
    }
}
