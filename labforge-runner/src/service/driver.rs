//! Execution driver
//!
//! Turns a job's configuration snapshot into engine operations:
//! - Preparing the job's working directory (descriptor, sources, dependencies)
//! - Building the per-invocation engine environment
//! - Selecting or creating the stack and writing its configuration
//! - Running preview, apply or destroy with progress streamed to the transcript
//! - Extracting results and cleaning up the working directory
//!
//! Every operation moves the job to `running` first and ends in exactly one
//! of its terminal statuses. Failures are recorded on the job (transcript
//! line, error message, `failed` status, snapshot) before being returned.

use labforge_core::domain::job::{Job, JobOperation, JobStatus};
use labforge_core::domain::lab::{Provider, ProviderCredentials};
use labforge_core::domain::outputs::LabOutputs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{Engine, EngineContext, ProgressSink};
use crate::environment::EngineEnv;
use crate::error::DriverError;
use crate::outputs;
use crate::repository::{CredentialStore, JobRepository};
use crate::service::transcript::Transcript;
use crate::stack::{self, StackPresence};
use crate::toolchain::Toolchain;
use crate::workspace::WorkDir;

/// How the working directory is prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preparation {
    /// Always regenerate sources and resolve dependencies
    Generate,
    /// Keep a complete working directory as-is
    Reuse,
}

/// Working directory and engine scope of a prepared job
struct Prepared {
    work: WorkDir,
    ctx: EngineContext,
}

/// Drives the engine on behalf of jobs
pub struct ExecutionDriver {
    config: Config,
    engine: Arc<dyn Engine>,
    toolchain: Arc<dyn Toolchain>,
    jobs: Arc<dyn JobRepository>,
    credentials: Arc<dyn CredentialStore>,
    prewarmed: AtomicBool,
}

impl ExecutionDriver {
    /// Creates a new execution driver
    ///
    /// # Arguments
    /// * `config` - Directories, executables and limits
    /// * `engine` - Infrastructure-as-code engine
    /// * `toolchain` - Dependency resolver for the lab program
    /// * `jobs` - Job records the driver mutates
    /// * `credentials` - Operator-configured provider credentials
    pub fn new(
        config: Config,
        engine: Arc<dyn Engine>,
        toolchain: Arc<dyn Toolchain>,
        jobs: Arc<dyn JobRepository>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            config,
            engine,
            toolchain,
            jobs,
            credentials,
            prewarmed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Switches dependency resolution to the lightweight consistency pass
    pub fn mark_prewarmed(&self) {
        self.prewarmed.store(true, Ordering::Release);
    }

    pub fn is_prewarmed(&self) -> bool {
        self.prewarmed.load(Ordering::Acquire)
    }

    fn transcript(&self, job_id: Uuid) -> Transcript {
        Transcript::new(self.jobs.clone(), job_id)
    }

    // ============================================================================
    // Operations
    // ============================================================================

    /// Plans the lab without changing any resource
    ///
    /// Ends in `dry-run-completed` or `failed`.
    pub async fn preview(&self, job_id: Uuid) -> Result<(), DriverError> {
        self.jobs.begin(job_id, JobOperation::Preview).await?;
        let sink = self.transcript(job_id);

        match self.run_preview(job_id, &sink).await {
            Ok(()) => {
                info!("Preview of job {} completed", job_id);
                Ok(())
            }
            Err(e) => self.fail(job_id, &sink, e).await,
        }
    }

    /// Provisions the lab from freshly generated sources
    ///
    /// Ends in `completed` or `failed`.
    pub async fn apply(&self, job_id: Uuid) -> Result<(), DriverError> {
        self.execute(job_id, JobOperation::Apply, Preparation::Generate)
            .await
    }

    /// Provisions a previewed lab, reusing the preview's working directory
    pub async fn launch(&self, job_id: Uuid) -> Result<(), DriverError> {
        self.execute(job_id, JobOperation::Launch, Preparation::Reuse)
            .await
    }

    /// Re-attempts a failed apply
    ///
    /// Generated files left by the failed attempt are reused; configuration
    /// and credentials are always re-applied.
    pub async fn retry(&self, job_id: Uuid) -> Result<(), DriverError> {
        self.execute(job_id, JobOperation::Apply, Preparation::Reuse)
            .await
    }

    /// Tears the lab down
    ///
    /// Ends in `destroyed`, or in `failed` with the stack state left in place
    /// so the destroy can be attempted again.
    pub async fn destroy(&self, job_id: Uuid) -> Result<(), DriverError> {
        self.jobs.begin(job_id, JobOperation::Destroy).await?;
        let sink = self.transcript(job_id);

        match self.run_destroy(job_id, &sink).await {
            Ok(()) => {
                self.persist(job_id, &sink).await;
                info!("Job {} destroyed", job_id);
                Ok(())
            }
            Err(e) => {
                sink.line("Stack state was kept so the destroy can be retried".to_string())
                    .await;
                self.fail(job_id, &sink, e).await
            }
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        operation: JobOperation,
        mode: Preparation,
    ) -> Result<(), DriverError> {
        self.jobs.begin(job_id, operation).await?;
        let sink = self.transcript(job_id);

        match self.run_apply(job_id, mode, &sink).await {
            Ok(()) => {
                self.persist(job_id, &sink).await;
                info!("Job {} completed", job_id);
                Ok(())
            }
            Err(e) => self.fail(job_id, &sink, e).await,
        }
    }

    // ============================================================================
    // Variants
    // ============================================================================

    async fn run_preview(&self, job_id: Uuid, sink: &Transcript) -> Result<(), DriverError> {
        let job = self.jobs.job(job_id).await?;
        let prepared = self.prepare(&job, Preparation::Generate, sink).await?;

        sink.line(format!("Previewing stack '{}'", prepared.ctx.stack))
            .await;
        self.engine
            .preview(&prepared.ctx, sink)
            .await
            .map_err(|e| DriverError::engine("preview", e))?;

        sink.line("Preview completed, no resources were changed".to_string())
            .await;
        self.jobs
            .update_status(job_id, JobStatus::DryRunCompleted)
            .await?;
        Ok(())
    }

    async fn run_apply(
        &self,
        job_id: Uuid,
        mode: Preparation,
        sink: &Transcript,
    ) -> Result<(), DriverError> {
        let job = self.jobs.job(job_id).await?;
        let prepared = self.prepare(&job, mode, sink).await?;

        sink.line(format!("Applying stack '{}'", prepared.ctx.stack))
            .await;
        if let Err(e) = self.engine.up(&prepared.ctx, sink).await {
            self.salvage(job_id, &prepared, sink).await;
            return Err(DriverError::engine("up", e));
        }

        let outputs = self.collect_outputs(&prepared, sink).await;
        self.jobs.set_result(job_id, outputs).await?;

        match prepared.work.prune().await {
            Ok(removed) => debug!("Pruned {} entries for job {}", removed, job_id),
            Err(e) => {
                sink.warning(format!("could not prune working directory: {}", e))
                    .await
            }
        }

        sink.line(format!("Lab '{}' provisioned successfully", job.config.stack_name))
            .await;
        self.jobs
            .update_status(job_id, JobStatus::Completed)
            .await?;
        Ok(())
    }

    async fn run_destroy(&self, job_id: Uuid, sink: &Transcript) -> Result<(), DriverError> {
        let job = self.jobs.job(job_id).await?;
        let credentials = self.resolve_credentials(&job).await?;

        let work = WorkDir::new(self.config.job_dir(&job.id));
        work.create()
            .await
            .map_err(|e| DriverError::preparation("working directory", e))?;

        if !work.has_descriptor().await {
            work.write_descriptor(
                &self.config.project_name,
                self.config.program_binary.as_deref(),
            )
            .await
            .map_err(|e| DriverError::preparation("descriptor generation", e))?;
            sink.line("Regenerated project descriptor for stack lookup".to_string())
                .await;
        }

        let ctx = self.context(&job, &work, &credentials);

        let presence = stack::locate(self.engine.as_ref(), &ctx, sink)
            .await
            .map_err(|e| DriverError::engine("stack lookup", e))?;

        if presence == StackPresence::Found {
            if let Err(e) = self.engine.refresh(&ctx, sink).await {
                sink.warning(format!("refresh failed, destroying from recorded state: {}", e))
                    .await;
            }

            sink.line(format!("Destroying stack '{}'", ctx.stack)).await;
            self.engine
                .destroy(&ctx, sink)
                .await
                .map_err(|e| DriverError::engine("destroy", e))?;

            if let Err(e) = self.engine.remove_stack(&ctx).await {
                sink.warning(format!("could not remove stack entry: {}", e))
                    .await;
            }
        }

        if let Err(e) = work.remove().await {
            sink.warning(format!("could not remove working directory: {}", e))
                .await;
        }

        sink.line(format!("Lab '{}' destroyed", ctx.stack)).await;
        self.jobs
            .update_status(job_id, JobStatus::Destroyed)
            .await?;
        Ok(())
    }

    // ============================================================================
    // Preparation
    // ============================================================================

    async fn prepare(
        &self,
        job: &Job,
        mode: Preparation,
        sink: &Transcript,
    ) -> Result<Prepared, DriverError> {
        let credentials = self.resolve_credentials(job).await?;

        let work = WorkDir::new(self.config.job_dir(&job.id));
        work.create()
            .await
            .map_err(|e| DriverError::preparation("working directory", e))?;

        if mode == Preparation::Reuse
            && work.has_generated_files(self.config.is_precompiled()).await
        {
            sink.line(format!(
                "Reusing working directory {}",
                work.path().display()
            ))
            .await;
        } else {
            self.generate(&work, sink).await?;
        }

        let ctx = self.context(job, &work, &credentials);

        stack::select_or_create(self.engine.as_ref(), &ctx, sink)
            .await
            .map_err(|e| DriverError::engine("stack selection", e))?;

        let entries = stack::project(&job.config, &credentials);
        stack::apply_config(self.engine.as_ref(), &ctx, &entries, sink)
            .await
            .map_err(|e| DriverError::engine("stack configuration", e))?;

        Ok(Prepared { work, ctx })
    }

    async fn generate(&self, work: &WorkDir, sink: &Transcript) -> Result<(), DriverError> {
        work.write_descriptor(
            &self.config.project_name,
            self.config.program_binary.as_deref(),
        )
        .await
        .map_err(|e| DriverError::preparation("descriptor generation", e))?;

        if let Some(binary) = &self.config.program_binary {
            sink.line(format!("Using precompiled lab program {}", binary.display()))
                .await;
            return Ok(());
        }

        let template_dir = &self.config.template_dir;
        let copied = work.copy_template(template_dir).await.map_err(|e| {
            DriverError::preparation(
                "source generation",
                format!("{}: {}", template_dir.display(), e),
            )
        })?;
        sink.line(format!(
            "Generated {} source file(s) from {}",
            copied,
            template_dir.display()
        ))
        .await;

        self.resolve_dependencies(work, sink).await
    }

    /// Resolves the program's dependencies under the configured time bound
    ///
    /// Exceeding the bound is only a warning; the engine's own build step
    /// then fetches whatever is still missing.
    async fn resolve_dependencies(
        &self,
        work: &WorkDir,
        sink: &Transcript,
    ) -> Result<(), DriverError> {
        let env = EngineEnv::shared(&self.config).into_vars();
        let limit = self.config.dependency_timeout;
        let prewarmed = self.is_prewarmed();

        let result = if prewarmed {
            sink.line("Verifying dependencies against the prewarmed cache".to_string())
                .await;
            tokio::time::timeout(limit, self.toolchain.verify(work.path(), &env)).await
        } else {
            sink.line("Downloading dependencies".to_string()).await;
            tokio::time::timeout(limit, self.toolchain.download(work.path(), &env)).await
        };

        match result {
            Ok(Ok(())) => {
                sink.line("Dependencies resolved".to_string()).await;
                Ok(())
            }
            Ok(Err(e)) => Err(DriverError::preparation("dependency resolution", e)),
            Err(_) => {
                sink.warning(format!(
                    "dependency resolution exceeded {}s, continuing",
                    limit.as_secs()
                ))
                .await;
                Ok(())
            }
        }
    }

    /// Credentials from the store, else the job's snapshot
    async fn resolve_credentials(&self, job: &Job) -> Result<ProviderCredentials, DriverError> {
        match self.credentials.get(Provider::Ovh).await {
            Ok(credentials) => return Ok(credentials),
            Err(e) => debug!("{}, falling back to job {} snapshot", e, job.id),
        }

        match &job.config.credentials {
            Some(credentials) if credentials.missing_fields().is_empty() => {
                Ok(credentials.clone())
            }
            Some(credentials) => Err(DriverError::ConfigurationMissing(format!(
                "job credentials are incomplete, missing: {}",
                credentials.missing_fields().join(", ")
            ))),
            None => Err(DriverError::ConfigurationMissing(format!(
                "no {} credentials in the store or in the job configuration",
                Provider::Ovh
            ))),
        }
    }

    fn context(
        &self,
        job: &Job,
        work: &WorkDir,
        credentials: &ProviderCredentials,
    ) -> EngineContext {
        EngineContext {
            work_dir: work.path().to_path_buf(),
            stack: job.config.stack_name.clone(),
            env: EngineEnv::for_job(&self.config, work.path(), credentials).into_vars(),
        }
    }

    // ============================================================================
    // Results and failures
    // ============================================================================

    async fn collect_outputs(&self, prepared: &Prepared, sink: &Transcript) -> LabOutputs {
        let map = match self.engine.read_outputs(&prepared.ctx).await {
            Ok(map) => map,
            Err(e) => {
                sink.warning(format!("could not read stack outputs: {}", e))
                    .await;
                return LabOutputs::default();
            }
        };

        let extraction = outputs::extract(&map, &prepared.work.kubeconfig_fallback()).await;
        for warning in extraction.warnings {
            sink.warning(warning).await;
        }
        extraction.outputs
    }

    /// Keeps the outputs of a partially applied stack
    ///
    /// A cluster created before the failure stays reachable through the
    /// recorded credentials instead of being orphaned.
    async fn salvage(&self, job_id: Uuid, prepared: &Prepared, sink: &Transcript) {
        sink.line("Apply failed, checking for partially created resources".to_string())
            .await;

        let outputs = self.collect_outputs(prepared, sink).await;
        if outputs.cluster_id.is_none() {
            return;
        }

        if let Err(e) = self.jobs.set_result(job_id, outputs).await {
            error!("Failed to store salvaged outputs of job {}: {:#}", job_id, e);
            return;
        }
        sink.line("Cluster was created before the failure; its access details were kept".to_string())
            .await;
    }

    /// Records a failure on the job and returns it
    async fn fail(
        &self,
        job_id: Uuid,
        sink: &Transcript,
        err: DriverError,
    ) -> Result<(), DriverError> {
        error!(phase = err.phase(), "Job {} failed: {}", job_id, err);
        sink.line(format!("Error: {}", err)).await;

        if let Err(e) = self.jobs.set_error(job_id, err.to_string()).await {
            error!("Failed to record failure of job {}: {:#}", job_id, e);
        }
        self.persist(job_id, sink).await;

        Err(err)
    }

    async fn persist(&self, job_id: Uuid, sink: &Transcript) {
        if let Err(e) = self.jobs.persist(job_id).await {
            sink.warning(format!("could not persist job: {:#}", e)).await;
        }
    }
}
