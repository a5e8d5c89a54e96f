//! Per-job working directories
//!
//! Every job gets its own directory under the configured work root, named
//! by job id, so concurrent jobs never touch each other's files. A working
//! directory holds:
//! - the engine project descriptor (`Pulumi.yaml`) and stack config files
//! - the lab program sources copied from the template set
//! - the engine's local state (`.pulumi/`), which must outlive pruning so a
//!   later destroy can still find the stack

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Engine state subdirectory, preserved by [`WorkDir::prune`]
pub const STATE_DIR: &str = ".pulumi";

/// Engine project descriptor
pub const DESCRIPTOR: &str = "Pulumi.yaml";

/// File the lab program writes cluster credentials to
pub const KUBECONFIG_FALLBACK: &str = "kubeconfig.yaml";

/// Sources that must exist for a directory to be reused as-is
const REQUIRED_SOURCES: &[&str] = &["go.mod", "main.go"];

/// A job's working directory
#[derive(Debug, Clone)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Creates the directory and its parents
    pub async fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path).await
    }

    /// Writes the engine project descriptor
    ///
    /// # Arguments
    /// * `project` - Engine project name
    /// * `binary` - Prebuilt program; when `None` the engine builds the sources
    pub async fn write_descriptor(&self, project: &str, binary: Option<&Path>) -> io::Result<()> {
        let mut descriptor = format!(
            "name: {}\ndescription: Ephemeral Kubernetes lab with a developer workspace platform\nruntime:\n  name: go\n",
            project
        );
        if let Some(binary) = binary {
            descriptor.push_str(&format!("  options:\n    binary: {}\n", binary.display()));
        }

        fs::write(self.path.join(DESCRIPTOR), descriptor).await
    }

    pub async fn has_descriptor(&self) -> bool {
        fs::try_exists(self.path.join(DESCRIPTOR))
            .await
            .unwrap_or(false)
    }

    /// Whether the engine's local state directory is present
    pub async fn has_state(&self) -> bool {
        fs::try_exists(self.path.join(STATE_DIR))
            .await
            .unwrap_or(false)
    }

    /// Whether everything a run needs is already in place
    ///
    /// # Arguments
    /// * `precompiled` - Only the descriptor is required for a prebuilt program
    pub async fn has_generated_files(&self, precompiled: bool) -> bool {
        if !self.has_descriptor().await {
            return false;
        }
        if precompiled {
            return true;
        }

        for name in REQUIRED_SOURCES {
            if !fs::try_exists(self.path.join(name)).await.unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// Copies the template set into the directory, overwriting existing files
    ///
    /// The descriptor and any engine state in the template are skipped.
    ///
    /// # Returns
    /// Number of files copied
    pub async fn copy_template(&self, template_dir: &Path) -> io::Result<usize> {
        let mut copied = 0;
        let mut pending = vec![(template_dir.to_path_buf(), self.path.clone())];

        while let Some((src, dst)) = pending.pop() {
            fs::create_dir_all(&dst).await?;

            let mut entries = fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if name == STATE_DIR || name == DESCRIPTOR {
                    continue;
                }

                let target = dst.join(&name);
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), target));
                } else if file_type.is_file() {
                    fs::copy(entry.path(), &target).await?;
                    copied += 1;
                }
            }
        }

        debug!(
            "Copied {} template file(s) into {}",
            copied,
            self.path.display()
        );
        Ok(copied)
    }

    /// Removes generated sources, keeping engine state and stack configuration
    ///
    /// # Returns
    /// Number of top-level entries removed
    pub async fn prune(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == STATE_DIR || (name.starts_with("Pulumi.") && name.ends_with(".yaml")) {
                continue;
            }

            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
            removed += 1;
        }

        debug!(
            "Pruned {} entr(ies) from {}",
            removed,
            self.path.display()
        );
        Ok(removed)
    }

    /// Deletes the whole directory; missing directories are not an error
    pub async fn remove(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Path of the kubeconfig file written by the lab program
    pub fn kubeconfig_fallback(&self) -> PathBuf {
        self.path.join(KUBECONFIG_FALLBACK)
    }
}
