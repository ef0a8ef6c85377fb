//! JSON-file job persistence.
//!
//! Each job is stored as `<dir>/<job_id>.json`. Writes go to a temporary
//! sibling first and are renamed into place, so a crash mid-write leaves
//! either the old record or the new one, never a truncated file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use strand_core::{
    defaults, is_portable_id, Error, Job, JobPatch, JobPersistence, JobStatus, Result,
};

const EXTENSION: &str = "json";

/// Directory-backed job store.
pub struct FileJobStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles (`update`) against other writes.
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file job store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store configured by the environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_STORE_DIR` | `.strand/jobs` | Directory holding job records |
    pub async fn from_env() -> Result<Self> {
        let dir = std::env::var("JOB_STORE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::JOB_STORE_DIR.to_string());
        Self::open(dir).await
    }

    /// Directory holding the job records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf> {
        if !is_portable_id(job_id) {
            return Err(Error::InvalidInput(format!(
                "job id not usable as a file name: {job_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{job_id}.{EXTENSION}")))
    }

    async fn read_job(path: &Path) -> Result<Option<Job>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_job(&self, job: &Job) -> Result<()> {
        let path = self.path_for(&job.id)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(job)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobPersistence for FileJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_job(job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        let path = self.path_for(job_id)?;
        Self::read_job(&path).await
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read_job(&path).await {
                Ok(Some(job)) => {
                    if status.map_or(true, |s| job.status == s) {
                        jobs.push(job);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable job record");
                }
            }
        }

        crate::sort_oldest_first(&mut jobs);
        Ok(jobs)
    }

    async fn update(&self, job_id: &str, patch: &JobPatch) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(job_id)?;
        let mut job = Self::read_job(&path)
            .await?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
        patch.apply(&mut job);
        self.write_job(&job).await
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(job_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{new_job_id, JobType};

    #[tokio::test]
    async fn test_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();

        assert!(store.path_for("job_0190abc").is_ok());
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("..").is_err());
        assert!(store.path_for("a/b").is_err());
        assert!(store.path_for("").is_err());
    }

    #[tokio::test]
    async fn test_dotted_prefix_ids_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();

        let id = new_job_id("v1.2");
        let job = Job::new(id.clone(), JobType::ExportPdf, serde_json::json!({}));
        store.save(&job).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap().unwrap().id, id);
        let listed = store.list(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
    }

    #[tokio::test]
    async fn test_sanitized_prefix_ids_are_writable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();

        let id = new_job_id("my jobs");
        assert!(id.starts_with("my-jobs_"));
        let job = Job::new(id.clone(), JobType::ExportPdf, serde_json::json!({}));
        store.save(&job).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("jobs");
        let store = FileJobStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested.as_path());
    }
}
