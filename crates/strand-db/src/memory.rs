//! In-memory job persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use strand_core::{Error, Job, JobPatch, JobPersistence, JobStatus, Result};

/// Job records held in a process-local map.
///
/// Nothing survives a restart; useful for tests and for hosts that want the
/// persistence contract without durable storage.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobPersistence for MemoryJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        crate::sort_oldest_first(&mut jobs);
        Ok(jobs)
    }

    async fn update(&self, job_id: &str, patch: &JobPatch) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
        patch.apply(job);
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        self.jobs.write().await.remove(job_id);
        Ok(())
    }
}
