//! Engine environment
//!
//! Each engine or toolchain invocation receives its own environment map
//! built here. The orchestrator's process environment is never modified, so
//! concurrently running jobs cannot observe each other's credentials.
//!
//! Values safe to share between jobs (caches, engine home, update checks)
//! come from [`EngineEnv::shared`]; backend location, secrets passphrase and
//! provider credentials are added per job by [`EngineEnv::for_job`].

use labforge_core::domain::lab::ProviderCredentials;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Used when neither an override nor any known directory is configured
pub const FALLBACK_BASE_DIR: &str = "/tmp/labforge";

/// Derives the shared base directory
///
/// Priority order:
/// 1. the explicit override
/// 2. the parent of the first known directory that is configured
///    (work directory, engine home, module cache, build cache, data directory)
/// 3. [`FALLBACK_BASE_DIR`]
///
/// Module cache paths conventionally end in `go/pkg/mod` and build caches in
/// `go/cache`; for those the base is the directory above `go`.
pub fn derive_base_dir(explicit: Option<&Path>, known: &[Option<&Path>]) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    for dir in known.iter().flatten() {
        if let Some(base) = base_of(dir) {
            return base;
        }
    }

    PathBuf::from(FALLBACK_BASE_DIR)
}

fn base_of(dir: &Path) -> Option<PathBuf> {
    // levels above the base for the conventional go cache layouts
    let depth = if dir.ends_with("go/pkg/mod") {
        3
    } else if dir.ends_with("go/cache") {
        2
    } else {
        1
    };

    dir.ancestors()
        .nth(depth)
        .filter(|base| !base.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Environment map for one engine invocation
#[derive(Clone, Default)]
pub struct EngineEnv {
    vars: BTreeMap<String, String>,
}

impl EngineEnv {
    /// Settings shared by every job and by the prewarmer
    pub fn shared(config: &Config) -> Self {
        let mut env = Self::default();
        env.set("PULUMI_HOME", config.pulumi_home.display().to_string());
        env.set("PULUMI_SKIP_UPDATE_CHECK", "true");
        env.set("PULUMI_DISABLE_AUTOMATIC_PLUGIN_ACQUISITION", "true");
        env.set("GOMODCACHE", config.go_mod_cache.display().to_string());
        env.set("GOCACHE", config.go_build_cache.display().to_string());
        env.set("GOPATH", config.base_dir.join("go").display().to_string());
        env.set("GOFLAGS", "-mod=mod");
        env.set("GOTOOLCHAIN", "local");
        env
    }

    /// Shared settings plus the backend and credentials of one job
    ///
    /// # Arguments
    /// * `config` - Driver configuration
    /// * `work_dir` - The job's working directory, which also holds its state
    /// * `credentials` - Provider credentials for this operation
    pub fn for_job(config: &Config, work_dir: &Path, credentials: &ProviderCredentials) -> Self {
        let mut env = Self::shared(config);
        env.set("PULUMI_BACKEND_URL", format!("file://{}", work_dir.display()));
        env.set("PULUMI_CONFIG_PASSPHRASE", config.state_passphrase.clone());

        env.set("OVH_ENDPOINT", credentials.endpoint.clone());
        env.set("OVH_APPLICATION_KEY", credentials.application_key.clone());
        env.set("OVH_APPLICATION_SECRET", credentials.application_secret.clone());
        env.set("OVH_CONSUMER_KEY", credentials.consumer_key.clone());
        env.set("OVH_CLOUD_PROJECT_SERVICE", credentials.project_id.clone());
        env
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    pub fn into_vars(self) -> BTreeMap<String, String> {
        self.vars
    }
}

impl std::fmt::Debug for EngineEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEnv")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}
