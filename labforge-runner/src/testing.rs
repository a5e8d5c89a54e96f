//! In-memory fakes for driver tests

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use labforge_core::domain::job::{Job, JobOperation, JobStatus};
use labforge_core::domain::outputs::LabOutputs;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::engine::{Engine, EngineContext, EngineError, ProgressSink};
use crate::repository::JobRepository;
use crate::toolchain::Toolchain;

fn scripted_failure(operation: &str) -> EngineError {
    EngineError::Failed {
        operation: operation.to_string(),
        code: 1,
        detail: format!("scripted {} failure", operation),
    }
}

#[derive(Default)]
struct EngineState {
    stacks: Vec<String>,
    failing: HashSet<String>,
    calls: Vec<String>,
    config: BTreeMap<String, (String, bool)>,
    outputs: Map<String, JsonValue>,
    progress: Vec<String>,
    envs: Vec<BTreeMap<String, String>>,
}

/// Scripted [`Engine`] recording every call
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(self, name: &str) -> Self {
        self.state.lock().unwrap().stacks.push(name.to_string());
        self
    }

    pub fn failing(self, operation: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(operation.to_string());
        self
    }

    pub fn with_outputs(self, outputs: JsonValue) -> Self {
        if let JsonValue::Object(map) = outputs {
            self.state.lock().unwrap().outputs = map;
        }
        self
    }

    pub fn with_progress(self, lines: &[&str]) -> Self {
        self.state.lock().unwrap().progress = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn config(&self) -> BTreeMap<String, (String, bool)> {
        self.state.lock().unwrap().config.clone()
    }

    pub fn stacks(&self) -> Vec<String> {
        self.state.lock().unwrap().stacks.clone()
    }

    /// Environment maps passed to every call, in call order
    pub fn envs(&self) -> Vec<BTreeMap<String, String>> {
        self.state.lock().unwrap().envs.clone()
    }

    fn record(&self, operation: &str, ctx: &EngineContext) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        state.envs.push(ctx.env.clone());
        if state.failing.contains(operation) {
            return Err(scripted_failure(operation));
        }
        Ok(())
    }

    async fn stream(
        &self,
        operation: &str,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let progress = self.state.lock().unwrap().progress.clone();
        for line in progress {
            sink.line(line).await;
        }
        self.record(operation, ctx)
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn select_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("select_stack", ctx)?;
        if self.stacks().contains(&ctx.stack) {
            Ok(())
        } else {
            Err(EngineError::Failed {
                operation: "stack select".to_string(),
                code: 255,
                detail: format!("no stack named '{}' found", ctx.stack),
            })
        }
    }

    async fn create_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("create_stack", ctx)?;
        self.state.lock().unwrap().stacks.push(ctx.stack.clone());
        Ok(())
    }

    async fn list_stacks(&self, ctx: &EngineContext) -> Result<Vec<String>, EngineError> {
        self.record("list_stacks", ctx)?;
        Ok(self.stacks())
    }

    async fn set_config(
        &self,
        ctx: &EngineContext,
        key: &str,
        value: &str,
        secret: bool,
    ) -> Result<(), EngineError> {
        self.record("set_config", ctx)?;
        self.state
            .lock()
            .unwrap()
            .config
            .insert(key.to_string(), (value.to_string(), secret));
        Ok(())
    }

    async fn preview(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        self.stream("preview", ctx, sink).await
    }

    async fn up(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError> {
        self.stream("up", ctx, sink).await
    }

    async fn destroy(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        self.stream("destroy", ctx, sink).await
    }

    async fn remove_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("remove_stack", ctx)?;
        self.state
            .lock()
            .unwrap()
            .stacks
            .retain(|name| name != &ctx.stack);
        Ok(())
    }

    async fn refresh(
        &self,
        ctx: &EngineContext,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        self.stream("refresh", ctx, sink).await
    }

    async fn read_outputs(
        &self,
        ctx: &EngineContext,
    ) -> Result<Map<String, JsonValue>, EngineError> {
        self.record("read_outputs", ctx)?;
        Ok(self.state.lock().unwrap().outputs.clone())
    }
}

/// Scripted [`Toolchain`]
#[derive(Default)]
pub struct FakeToolchain {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, operation: &str) -> Self {
        self.failing.lock().unwrap().insert(operation.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn run(&self, operation: String) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(operation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(scripted_failure(&operation));
        }
        Ok(())
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn download(
        &self,
        _dir: &Path,
        _env: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        self.run("download".to_string()).await
    }

    async fn verify(&self, _dir: &Path, _env: &BTreeMap<String, String>) -> Result<(), EngineError> {
        self.run("verify".to_string()).await
    }

    async fn check_package(
        &self,
        _dir: &Path,
        _env: &BTreeMap<String, String>,
        package: &str,
    ) -> Result<(), EngineError> {
        self.run(format!("check {}", package)).await
    }
}

/// Sink collecting lines in memory
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn line(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

/// [`JobRepository`] over a plain map, enforcing the state machine
#[derive(Default)]
pub struct MemoryJobs {
    jobs: Mutex<HashMap<Uuid, Job>>,
    history: Mutex<HashMap<Uuid, Vec<JobStatus>>>,
    persisted: Mutex<Vec<Uuid>>,
}

impl MemoryJobs {
    pub fn insert(&self, job: Job) -> Uuid {
        let id = job.id;
        self.history
            .lock()
            .unwrap()
            .insert(id, vec![job.status]);
        self.jobs.lock().unwrap().insert(id, job);
        id
    }

    pub fn get(&self, id: Uuid) -> Job {
        self.jobs.lock().unwrap()[&id].clone()
    }

    /// Every status the job has been in, oldest first
    pub fn history(&self, id: Uuid) -> Vec<JobStatus> {
        self.history.lock().unwrap()[&id].clone()
    }

    pub fn persisted(&self) -> Vec<Uuid> {
        self.persisted.lock().unwrap().clone()
    }

    fn set_status(&self, id: Uuid, status: JobStatus) {
        self.history
            .lock()
            .unwrap()
            .entry(id)
            .or_default()
            .push(status);
    }
}

#[async_trait]
impl JobRepository for MemoryJobs {
    async fn job(&self, job_id: Uuid) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| anyhow!("job {} not found", job_id))
    }

    async fn begin(&self, job_id: Uuid, operation: JobOperation) -> Result<()> {
        self.update_status(job_id, JobStatus::Running).await?;
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.error = None;
            job.last_operation = Some(operation);
        }
        Ok(())
    }

    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<()> {
        {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(&job_id)
                .ok_or_else(|| anyhow!("job {} not found", job_id))?;
            if !job.status.can_transition_to(status) {
                bail!("invalid transition {} -> {}", job.status, status);
            }
            job.status = status;
            job.updated_at = Utc::now();
        }
        self.set_status(job_id, status);
        Ok(())
    }

    async fn append_output(&self, job_id: Uuid, line: String) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;
        job.output.push(line);
        Ok(())
    }

    async fn set_error(&self, job_id: Uuid, error: String) -> Result<()> {
        {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(&job_id)
                .ok_or_else(|| anyhow!("job {} not found", job_id))?;
            if !job.status.can_fail() {
                bail!("job {} is {}, cannot fail", job_id, job.status);
            }
            job.status = JobStatus::Failed;
            job.error = Some(error);
        }
        self.set_status(job_id, JobStatus::Failed);
        Ok(())
    }

    async fn set_result(&self, job_id: Uuid, outputs: LabOutputs) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| anyhow!("job {} not found", job_id))?;
        job.outputs = outputs;
        Ok(())
    }

    async fn persist(&self, job_id: Uuid) -> Result<()> {
        self.persisted.lock().unwrap().push(job_id);
        Ok(())
    }
}
