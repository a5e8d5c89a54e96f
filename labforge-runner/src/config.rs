//! Driver configuration
//!
//! Defines the directories, executables and limits the execution driver
//! works with. Every directory defaults to a location under one shared base
//! directory; see [`crate::environment::derive_base_dir`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environment::derive_base_dir;

/// Default bound for dependency resolution
const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(300);

/// Driver configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared base directory for caches and defaults
    pub base_dir: PathBuf,

    /// Parent of the per-job working directories
    pub work_dir: PathBuf,

    /// Template set copied into each working directory
    pub template_dir: PathBuf,

    /// Engine home (plugins, credentials cache)
    pub pulumi_home: PathBuf,

    /// Shared Go module cache
    pub go_mod_cache: PathBuf,

    /// Shared Go build cache
    pub go_build_cache: PathBuf,

    /// Prebuilt lab program; when set no sources are generated per job
    pub program_binary: Option<PathBuf>,

    /// Engine project name written to the descriptor
    pub project_name: String,

    /// Upper bound for dependency resolution before it is abandoned
    pub dependency_timeout: Duration,

    /// Passphrase protecting secrets in the local state backend
    pub state_passphrase: String,

    /// Engine executable
    pub pulumi_binary: String,

    /// Go executable
    pub go_binary: String,
}

impl Config {
    /// Creates a configuration with every directory under `base_dir`
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            work_dir: base_dir.join("work"),
            template_dir: base_dir.join("template"),
            pulumi_home: base_dir.join("pulumi"),
            go_mod_cache: base_dir.join("go").join("pkg").join("mod"),
            go_build_cache: base_dir.join("go").join("cache"),
            base_dir,
            program_binary: None,
            project_name: "labforge-lab".to_string(),
            dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
            state_passphrase: "labforge".to_string(),
            pulumi_binary: "pulumi".to_string(),
            go_binary: "go".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - LABFORGE_BASE_DIR
    /// - LABFORGE_WORK_DIR
    /// - LABFORGE_TEMPLATE_DIR
    /// - LABFORGE_DATA_DIR (only consulted to derive the base directory)
    /// - LABFORGE_PROGRAM_BINARY
    /// - LABFORGE_DEPENDENCY_TIMEOUT (seconds, default: 300)
    /// - LABFORGE_STATE_PASSPHRASE
    /// - PULUMI_HOME, GOMODCACHE, GOCACHE
    /// - PULUMI_BINARY, GO_BINARY
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };

        let work_dir = path("LABFORGE_WORK_DIR");
        let template_dir = path("LABFORGE_TEMPLATE_DIR");
        let pulumi_home = path("PULUMI_HOME");
        let go_mod_cache = path("GOMODCACHE");
        let go_build_cache = path("GOCACHE");
        let data_dir = path("LABFORGE_DATA_DIR");

        let base_dir = derive_base_dir(
            path("LABFORGE_BASE_DIR").as_deref(),
            &[
                work_dir.as_deref(),
                pulumi_home.as_deref(),
                go_mod_cache.as_deref(),
                go_build_cache.as_deref(),
                data_dir.as_deref(),
            ],
        );

        let mut config = Self::new(base_dir);

        if let Some(dir) = work_dir {
            config.work_dir = dir;
        }
        if let Some(dir) = template_dir {
            config.template_dir = dir;
        }
        if let Some(dir) = pulumi_home {
            config.pulumi_home = dir;
        }
        if let Some(dir) = go_mod_cache {
            config.go_mod_cache = dir;
        }
        if let Some(dir) = go_build_cache {
            config.go_build_cache = dir;
        }

        config.program_binary = path("LABFORGE_PROGRAM_BINARY");

        if let Some(secs) = lookup("LABFORGE_DEPENDENCY_TIMEOUT").and_then(|s| s.parse::<u64>().ok())
        {
            config.dependency_timeout = Duration::from_secs(secs);
        }
        if let Some(passphrase) = lookup("LABFORGE_STATE_PASSPHRASE") {
            config.state_passphrase = passphrase;
        }
        if let Some(binary) = lookup("PULUMI_BINARY").filter(|v| !v.is_empty()) {
            config.pulumi_binary = binary;
        }
        if let Some(binary) = lookup("GO_BINARY").filter(|v| !v.is_empty()) {
            config.go_binary = binary;
        }

        config
    }

    /// Whether jobs run a prebuilt program instead of generated sources
    pub fn is_precompiled(&self) -> bool {
        self.program_binary.is_some()
    }

    /// Working directory of a job
    pub fn job_dir(&self, job_id: &uuid::Uuid) -> PathBuf {
        self.work_dir.join(job_id.to_string())
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let dirs: [(&str, &Path); 5] = [
            ("work_dir", &self.work_dir),
            ("template_dir", &self.template_dir),
            ("pulumi_home", &self.pulumi_home),
            ("go_mod_cache", &self.go_mod_cache),
            ("go_build_cache", &self.go_build_cache),
        ];
        for (name, dir) in dirs {
            if dir.as_os_str().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.dependency_timeout.as_secs() == 0 {
            anyhow::bail!("dependency_timeout must be greater than 0");
        }

        if self.state_passphrase.is_empty() {
            anyhow::bail!("state_passphrase cannot be empty");
        }

        if self.project_name.is_empty() {
            anyhow::bail!("project_name cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(derive_base_dir(None, &[]))
    }
}
