//! Dependency prewarmer
//!
//! Runs once at startup against the template directory, filling the shared
//! module cache so per-job preparation only needs a consistency pass.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::environment::EngineEnv;
use crate::error::DriverError;
use crate::toolchain::Toolchain;

/// Provider packages every lab program imports
pub const CRITICAL_PACKAGES: &[&str] = &[
    "github.com/pulumi/pulumi/sdk/v3/go/pulumi",
    "github.com/pulumi/pulumi/sdk/v3/go/pulumi/config",
    "github.com/ovh/pulumi-ovh/sdk/v2/go/ovh/cloudproject",
    "github.com/pulumi/pulumi-kubernetes/sdk/v4/go/kubernetes",
    "github.com/pulumi/pulumi-kubernetes/sdk/v4/go/kubernetes/helm/v3",
];

/// Outcome of a prewarm run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PrewarmReport {
    /// Packages that resolved
    pub verified: Vec<String>,
    /// Packages that did not resolve, with the reason
    pub failed: Vec<(String, String)>,
}

impl PrewarmReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fills the module cache from the template directory
pub struct Prewarmer {
    config: Config,
    toolchain: Arc<dyn Toolchain>,
    packages: Vec<String>,
}

impl Prewarmer {
    pub fn new(config: Config, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            config,
            toolchain,
            packages: CRITICAL_PACKAGES.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Replaces the list of packages verified after the download
    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.packages = packages;
        self
    }

    /// Downloads dependencies and verifies the critical packages
    ///
    /// The download itself must succeed within the dependency timeout;
    /// individual package checks only produce warnings.
    pub async fn run(&self) -> Result<PrewarmReport, DriverError> {
        let dir = &self.config.template_dir;
        if !tokio::fs::try_exists(dir.join("go.mod")).await.unwrap_or(false) {
            return Err(DriverError::preparation(
                "prewarm",
                format!("no go.mod in {}", dir.display()),
            ));
        }

        let env = EngineEnv::shared(&self.config).into_vars();
        let limit = self.config.dependency_timeout;

        info!("Prewarming module cache from {}", dir.display());
        match tokio::time::timeout(limit, self.toolchain.download(dir, &env)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(DriverError::preparation("prewarm", e)),
            Err(_) => {
                return Err(DriverError::preparation(
                    "prewarm",
                    format!("download exceeded {}s", limit.as_secs()),
                ));
            }
        }

        let mut report = PrewarmReport::default();
        for package in &self.packages {
            match self.toolchain.check_package(dir, &env, package).await {
                Ok(()) => report.verified.push(package.clone()),
                Err(e) => {
                    warn!("Package {} did not resolve: {}", package, e);
                    report.failed.push((package.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Prewarm finished: {} verified, {} failed",
            report.verified.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolchain;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let config = Config::new(tmp.path().to_path_buf());
        std::fs::create_dir_all(&config.template_dir).unwrap();
        std::fs::write(config.template_dir.join("go.mod"), "module lab").unwrap();
        config
    }

    #[tokio::test]
    async fn test_prewarm_verifies_packages() {
        let tmp = TempDir::new().unwrap();
        let toolchain = Arc::new(FakeToolchain::new());
        let prewarmer = Prewarmer::new(config(&tmp), toolchain.clone())
            .with_packages(vec!["a".to_string(), "b".to_string()]);

        let report = prewarmer.run().await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.verified, vec!["a", "b"]);
        assert_eq!(toolchain.calls(), vec!["download", "check a", "check b"]);
    }

    #[tokio::test]
    async fn test_package_failure_is_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let toolchain = Arc::new(FakeToolchain::new().failing("check b"));
        let prewarmer = Prewarmer::new(config(&tmp), toolchain)
            .with_packages(vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        let report = prewarmer.run().await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.verified, vec!["a", "c"]);
        assert_eq!(report.failed[0].0, "b");
    }

    #[tokio::test]
    async fn test_download_failure_fails_prewarm() {
        let tmp = TempDir::new().unwrap();
        let prewarmer = Prewarmer::new(
            config(&tmp),
            Arc::new(FakeToolchain::new().failing("download")),
        );
        assert!(prewarmer.run().await.is_err());
    }

    #[tokio::test]
    async fn test_download_timeout_fails_prewarm() {
        let tmp = TempDir::new().unwrap();
        let mut config = config(&tmp);
        config.dependency_timeout = Duration::from_millis(10);
        let prewarmer = Prewarmer::new(
            config,
            Arc::new(FakeToolchain::new().with_delay(Duration::from_millis(300))),
        );

        let err = prewarmer.run().await.unwrap_err();
        assert!(err.to_string().contains("exceeded"));
    }

    #[tokio::test]
    async fn test_missing_template_fails_prewarm() {
        let tmp = TempDir::new().unwrap();
        let prewarmer = Prewarmer::new(
            Config::new(tmp.path().to_path_buf()),
            Arc::new(FakeToolchain::new()),
        );
        assert!(prewarmer.run().await.is_err());
    }
}
