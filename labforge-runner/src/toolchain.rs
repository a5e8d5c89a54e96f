//! Lab program toolchain
//!
//! The lab program is written in Go. Before the engine runs it, its module
//! graph is resolved into the shared module cache so the engine's own build
//! step never stalls on the network.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::engine::{EngineError, run_captured};

/// Dependency operations on a program directory
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Downloads the full dependency graph into the module cache
    async fn download(&self, dir: &Path, env: &BTreeMap<String, String>)
    -> Result<(), EngineError>;

    /// Lightweight consistency pass against an already-populated cache
    async fn verify(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<(), EngineError>;

    /// Checks that a single package resolves
    async fn check_package(
        &self,
        dir: &Path,
        env: &BTreeMap<String, String>,
        package: &str,
    ) -> Result<(), EngineError>;
}

/// [`Toolchain`] backed by the `go` command
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: String,
}

impl GoToolchain {
    /// Creates a new Go toolchain
    ///
    /// # Arguments
    /// * `binary` - Executable name or path (e.g. "go")
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, dir: &Path, env: &BTreeMap<String, String>, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command.current_dir(dir).args(args).envs(env);
        command
    }

    async fn run(
        &self,
        dir: &Path,
        env: &BTreeMap<String, String>,
        args: &[&str],
        operation: &str,
    ) -> Result<(), EngineError> {
        debug!("go {} in {}", args.join(" "), dir.display());
        let command = self.command(dir, env, args);
        run_captured(command, operation, None)
            .await?
            .into_stdout(operation)?;
        Ok(())
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn download(
        &self,
        dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        self.run(dir, env, &["mod", "download"], "go mod download")
            .await
    }

    async fn verify(&self, dir: &Path, env: &BTreeMap<String, String>) -> Result<(), EngineError> {
        self.run(dir, env, &["mod", "verify"], "go mod verify").await
    }

    async fn check_package(
        &self,
        dir: &Path,
        env: &BTreeMap<String, String>,
        package: &str,
    ) -> Result<(), EngineError> {
        self.run(dir, env, &["list", package], "go list").await
    }
}
