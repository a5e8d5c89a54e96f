//! Labforge orchestrator
//!
//! Owns the job registry and its snapshots, the credential store and the
//! lifecycle service, and exposes them over a JSON HTTP surface. The
//! execution driver from `labforge-runner` does the engine work.

pub mod api;
pub mod config;
pub mod repository;
pub mod service;

use anyhow::{Context, Result};
use labforge_core::domain::lab::Provider;
use labforge_runner::engine::Engine;
use labforge_runner::repository::{CredentialStore, InMemoryCredentialStore};
use labforge_runner::toolchain::Toolchain;
use labforge_runner::{ExecutionDriver, Prewarmer};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::api::AppState;
use crate::config::Config;
use crate::repository::{JobRegistry, SnapshotStore};
use crate::service::job_service::JobService;

/// Wires the registry, credential store, driver and service together
///
/// Persisted jobs are reloaded before the state is returned.
///
/// # Arguments
/// * `config` - Validated process configuration
/// * `engine` - Infrastructure-as-code engine
/// * `toolchain` - Dependency resolver for the lab program
pub async fn build_state(
    config: &Config,
    engine: Arc<dyn Engine>,
    toolchain: Arc<dyn Toolchain>,
) -> Result<AppState> {
    let store = config.data_dir.clone().map(SnapshotStore::new);
    let registry = Arc::new(JobRegistry::new(store));

    let reloaded = registry
        .reload()
        .await
        .context("Failed to reload persisted jobs")?;
    if reloaded > 0 {
        tracing::info!("Restored {} job(s)", reloaded);
    }

    let credentials: Arc<dyn CredentialStore> = match &config.seed_credentials {
        Some(seed) => {
            tracing::info!("Seeding {} credentials from the environment", Provider::Ovh);
            Arc::new(InMemoryCredentialStore::with(Provider::Ovh, seed.clone()))
        }
        None => Arc::new(InMemoryCredentialStore::new()),
    };

    let driver = Arc::new(ExecutionDriver::new(
        config.runner.clone(),
        engine,
        toolchain,
        registry.clone(),
        credentials.clone(),
    ));

    let jobs = Arc::new(JobService::new(registry, driver, credentials.clone()));
    Ok(AppState { jobs, credentials })
}

/// Runs the dependency prewarmer on a background task
///
/// On success the driver switches to the lightweight consistency pass. A
/// failure is logged and leaves full resolution in place for every job.
pub fn spawn_prewarm(
    driver: Arc<ExecutionDriver>,
    toolchain: Arc<dyn Toolchain>,
) -> JoinHandle<()> {
    let prewarmer = Prewarmer::new(driver.config().clone(), toolchain);

    tokio::spawn(async move {
        match prewarmer.run().await {
            Ok(report) => {
                for (package, reason) in &report.failed {
                    tracing::warn!("Prewarm could not resolve {}: {}", package, reason);
                }
                driver.mark_prewarmed();
            }
            Err(e) => tracing::warn!("Prewarm failed, jobs will resolve dependencies fully: {}", e),
        }
    })
}
