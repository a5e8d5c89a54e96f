//! Snapshot Store
//!
//! One JSON document per job, named `<id>.json`. Writes go to a temporary
//! file in the same directory and are renamed into place, so a crash never
//! leaves a half-written snapshot behind.

use labforge_core::domain::job::Job;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::repository::job::RegistryError;

const EXTENSION: &str = "json";

/// File-based job snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot file of a job
    pub fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.{}", id, EXTENSION))
    }

    /// Writes a job snapshot atomically
    pub async fn save(&self, job: &Job) -> Result<(), RegistryError> {
        let persistence = |source: io::Error| RegistryError::Persistence { id: job.id, source };

        fs::create_dir_all(&self.dir).await.map_err(persistence)?;

        let content = serde_json::to_vec_pretty(job)?;
        let path = self.path(job.id);
        let tmp_path = self.dir.join(format!(".{}.{}.tmp", job.id, EXTENSION));

        fs::write(&tmp_path, content).await.map_err(persistence)?;
        restrict_permissions(&tmp_path).await.map_err(persistence)?;

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(persistence(e));
        }

        debug!("Saved snapshot of job {} to {}", job.id, path.display());
        Ok(())
    }

    /// Deletes a job snapshot; a missing file is not an error
    pub async fn delete(&self, id: Uuid) -> Result<(), RegistryError> {
        match fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Persistence { id, source }),
        }
    }

    /// Reads every readable snapshot in the directory
    ///
    /// Unreadable or corrupt files are skipped with a warning.
    pub async fn load_all(&self) -> Result<Vec<Job>, io::Error> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut jobs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_snapshot = path.extension().is_some_and(|ext| ext == EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_snapshot {
                continue;
            }

            let content = match fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable snapshot {}: {}", path.display(), e);
                    continue;
                }
            };

            match serde_json::from_slice::<Job>(&content) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping corrupt snapshot {}: {}", path.display(), e),
            }
        }

        Ok(jobs)
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // snapshots carry credentials and kubeconfigs
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_core::domain::job::JobStatus;
    use labforge_core::domain::lab::LabConfig;
    use tempfile::TempDir;

    fn completed_job() -> Job {
        let mut job = Job::new(LabConfig::example("dev"));
        job.status = JobStatus::Completed;
        job.output = vec!["Applying stack 'dev'".to_string(), "done".to_string()];
        job.outputs.kubeconfig = Some("apiVersion: v1".to_string());
        job
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("jobs"));
        let job = completed_job();

        store.save(&job).await.unwrap();
        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, job.id);
        assert_eq!(loaded[0].output, job.output);
        assert_eq!(loaded[0].config, job.config);
        assert_eq!(loaded[0].outputs, job.outputs);
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snapshot_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        let job = completed_job();
        store.save(&job).await.unwrap();

        let mode = std::fs::metadata(store.path(job.id)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        store.save(&completed_job()).await.unwrap();
        std::fs::write(tmp.path().join(format!("{}.json", Uuid::new_v4())), "{ not json").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(tmp.path().join(".partial.json.tmp"), "{").unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_missing_fields_are_tolerated() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        let mut value = serde_json::to_value(completed_job()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("output");
        object.remove("outputs");
        object.insert("added_later".to_string(), serde_json::json!(true));
        let id = object["id"].as_str().unwrap().to_string();
        std::fs::write(tmp.path().join(format!("{}.json", id)), value.to_string()).unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].output.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("absent"));
        assert!(store.load_all().await.unwrap().is_empty());
        store.delete(Uuid::new_v4()).await.unwrap();
    }
}
