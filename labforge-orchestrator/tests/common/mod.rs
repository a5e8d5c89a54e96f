//! Shared fixtures for orchestrator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use labforge_core::domain::job::{Job, JobStatus};
use labforge_orchestrator::api::AppState;
use labforge_orchestrator::build_state;
use labforge_orchestrator::config::Config;
use labforge_runner::engine::{Engine, EngineContext, EngineError, ProgressSink};
use labforge_runner::toolchain::Toolchain;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

fn scripted_failure(operation: &str) -> EngineError {
    EngineError::Failed {
        operation: operation.to_string(),
        code: 1,
        detail: format!("scripted {} failure", operation),
    }
}

#[derive(Default)]
struct EngineState {
    stacks: HashSet<String>,
    failing: HashSet<String>,
    calls: Vec<String>,
    outputs: Map<String, JsonValue>,
}

/// Engine double that keeps stacks in memory
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(self, outputs: JsonValue) -> Self {
        if let JsonValue::Object(map) = outputs {
            self.state.lock().unwrap().outputs = map;
        }
        self
    }

    /// Makes an operation fail until [`FakeEngine::heal`] is called
    pub fn fail(&self, operation: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(operation.to_string());
    }

    pub fn heal(&self, operation: &str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    pub fn has_stack(&self, name: &str) -> bool {
        self.state.lock().unwrap().stacks.contains(name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, operation: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        if state.failing.contains(operation) {
            return Err(scripted_failure(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn select_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("select_stack")?;
        if self.has_stack(&ctx.stack) {
            Ok(())
        } else {
            Err(scripted_failure("select_stack"))
        }
    }

    async fn create_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("create_stack")?;
        // the local backend keeps stack state inside the working directory
        let state_dir = ctx.work_dir.join(".pulumi").join("stacks");
        std::fs::create_dir_all(&state_dir).unwrap();
        std::fs::write(state_dir.join(format!("{}.json", ctx.stack)), "{}").unwrap();
        self.state.lock().unwrap().stacks.insert(ctx.stack.clone());
        Ok(())
    }

    async fn list_stacks(&self, _ctx: &EngineContext) -> Result<Vec<String>, EngineError> {
        self.record("list_stacks")?;
        Ok(self.state.lock().unwrap().stacks.iter().cloned().collect())
    }

    async fn set_config(
        &self,
        _ctx: &EngineContext,
        _key: &str,
        _value: &str,
        _secret: bool,
    ) -> Result<(), EngineError> {
        self.record("set_config")
    }

    async fn preview(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError> {
        sink.line(format!("Previewing update ({})", ctx.stack)).await;
        self.record("preview")
    }

    async fn up(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError> {
        sink.line(format!("Updating ({})", ctx.stack)).await;
        self.record("up")
    }

    async fn destroy(&self, ctx: &EngineContext, sink: &dyn ProgressSink) -> Result<(), EngineError> {
        sink.line(format!("Destroying ({})", ctx.stack)).await;
        self.record("destroy")
    }

    async fn remove_stack(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        self.record("remove_stack")?;
        self.state.lock().unwrap().stacks.remove(&ctx.stack);
        Ok(())
    }

    async fn refresh(&self, _ctx: &EngineContext, _sink: &dyn ProgressSink) -> Result<(), EngineError> {
        self.record("refresh")
    }

    async fn read_outputs(&self, _ctx: &EngineContext) -> Result<Map<String, JsonValue>, EngineError> {
        self.record("read_outputs")?;
        Ok(self.state.lock().unwrap().outputs.clone())
    }
}

/// Toolchain double where every step succeeds immediately
#[derive(Default)]
pub struct FakeToolchain;

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn download(&self, _dir: &Path, _env: &BTreeMap<String, String>) -> Result<(), EngineError> {
        Ok(())
    }

    async fn verify(&self, _dir: &Path, _env: &BTreeMap<String, String>) -> Result<(), EngineError> {
        Ok(())
    }

    async fn check_package(
        &self,
        _dir: &Path,
        _env: &BTreeMap<String, String>,
        _package: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Outputs of a lab whose platform came up
pub fn lab_outputs() -> JsonValue {
    serde_json::json!({
        "clusterId": "c-1",
        "kubeconfig": {"value": "apiVersion: v1", "secret": true},
        "platformUrl": "https://coder.dev.lab",
        "sessionToken": {"value": "token", "secret": true},
        "adminEmail": "admin@example.com",
    })
}

/// Orchestrator state over a temporary base directory
pub struct Harness {
    pub tmp: TempDir,
    pub config: Config,
    pub engine: Arc<FakeEngine>,
    pub state: AppState,
}

impl Harness {
    pub async fn new(engine: FakeEngine) -> Self {
        Self::build(TempDir::new().unwrap(), engine, true).await
    }

    pub async fn without_credentials(engine: FakeEngine) -> Self {
        Self::build(TempDir::new().unwrap(), engine, false).await
    }

    /// Builds a second orchestrator over the same directories
    pub async fn restart(self) -> Self {
        Self::build(self.tmp, FakeEngine::new(), true).await
    }

    /// Same as [`Harness::restart`] with no credentials configured
    pub async fn restart_without_credentials(self) -> Self {
        Self::build(self.tmp, FakeEngine::new(), false).await
    }

    async fn build(tmp: TempDir, engine: FakeEngine, seed: bool) -> Self {
        let base = tmp.path().display().to_string();
        let data = tmp.path().join("data").display().to_string();
        let mut vars: HashMap<String, String> = HashMap::from([
            ("LABFORGE_BASE_DIR".to_string(), base),
            ("LABFORGE_DATA_DIR".to_string(), data),
            ("LABFORGE_PREWARM".to_string(), "false".to_string()),
        ]);
        if seed {
            for (key, value) in [
                ("OVH_ENDPOINT", "ovh-eu"),
                ("OVH_APPLICATION_KEY", "ak"),
                ("OVH_APPLICATION_SECRET", "as"),
                ("OVH_CONSUMER_KEY", "ck"),
                ("OVH_CLOUD_PROJECT_SERVICE", "project-1"),
            ] {
                vars.insert(key.to_string(), value.to_string());
            }
        }

        let config = Config::from_lookup(move |key| vars.get(key).cloned());
        config.ensure_dirs().await.unwrap();
        write_template(&config.runner.template_dir);

        let engine = Arc::new(engine);
        let state = build_state(&config, engine.clone(), Arc::new(FakeToolchain))
            .await
            .unwrap();

        Self {
            tmp,
            config,
            engine,
            state,
        }
    }

    pub fn work_dir(&self, id: Uuid) -> PathBuf {
        self.config.runner.job_dir(&id)
    }

    /// Polls a job until it reaches `status`
    pub async fn wait_for(&self, id: Uuid, status: JobStatus) -> Job {
        wait_for(&self.state, id, status).await
    }
}

pub async fn wait_for(state: &AppState, id: Uuid, status: JobStatus) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = state.jobs.get(id).await.unwrap();
        if job.status == status {
            // let the background task finish its bookkeeping
            tokio::time::sleep(Duration::from_millis(20)).await;
            return state.jobs.get(id).await.unwrap();
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "job {} stuck in {} waiting for {}: {:?}",
                id, job.status, status, job.output
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn write_template(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
    std::fs::write(dir.join("go.mod"), "module lab\n\ngo 1.22\n").unwrap();
}
