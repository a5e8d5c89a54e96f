//! Orchestrator configuration
//!
//! Process settings loaded from environment variables with fallback to
//! defaults. Driver settings (directories, executables, limits) are loaded
//! from the same environment by [`labforge_runner::Config`].

use anyhow::{Context, Result};
use labforge_core::domain::lab::ProviderCredentials;
use std::path::PathBuf;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address
    pub bind_addr: String,

    /// Directory holding job snapshots; `None` disables persistence
    pub data_dir: Option<PathBuf>,

    /// Run the dependency prewarmer at startup
    pub prewarm: bool,

    /// Execution driver settings
    pub runner: labforge_runner::Config,

    /// Credentials seeded into the credential store at startup
    pub seed_credentials: Option<ProviderCredentials>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - LABFORGE_BIND_ADDR (default: 0.0.0.0:8080)
    /// - LABFORGE_DATA_DIR
    /// - LABFORGE_PREWARM (default: true)
    /// - OVH_ENDPOINT, OVH_APPLICATION_KEY, OVH_APPLICATION_SECRET,
    ///   OVH_CONSUMER_KEY, OVH_CLOUD_PROJECT_SERVICE (seed credentials,
    ///   used only when all five are set)
    /// - everything read by [`labforge_runner::Config::from_env`]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("LABFORGE_BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let data_dir = lookup("LABFORGE_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let prewarm = lookup("LABFORGE_PREWARM")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(true);

        Self {
            bind_addr,
            data_dir,
            prewarm,
            runner: labforge_runner::Config::from_lookup(&lookup),
            seed_credentials: seed_credentials(&lookup),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if let Some(credentials) = &self.seed_credentials {
            let missing = credentials.missing_fields();
            if !missing.is_empty() {
                anyhow::bail!("seed credentials are missing: {}", missing.join(", "));
            }
        }

        self.runner
            .validate()
            .context("Invalid driver configuration")
    }

    /// Creates every directory the orchestrator and driver write to
    pub async fn ensure_dirs(&self) -> Result<()> {
        let runner = &self.runner;
        let mut dirs = vec![
            &runner.work_dir,
            &runner.pulumi_home,
            &runner.go_mod_cache,
            &runner.go_build_cache,
        ];
        if let Some(data_dir) = &self.data_dir {
            dirs.push(data_dir);
        }

        for dir in dirs {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

fn seed_credentials<F>(lookup: &F) -> Option<ProviderCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    Some(ProviderCredentials {
        endpoint: get("OVH_ENDPOINT")?,
        application_key: get("OVH_APPLICATION_KEY")?,
        application_secret: get("OVH_APPLICATION_SECRET")?,
        consumer_key: get("OVH_CONSUMER_KEY")?,
        project_id: get("OVH_CLOUD_PROJECT_SERVICE")?,
    })
}
