//! In-memory job record store: the scheduler's live view of every job.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use strand_core::{payloads_equal, Job, JobStatus, JobType, QueueStats};

/// Job records keyed by id, remembering insertion order.
///
/// Insertion order is admission order, which is the FIFO order the
/// scheduler loop follows. Not synchronized; the scheduler wraps it in a
/// mutex.
#[derive(Debug, Default)]
pub struct JobRecordStore {
    jobs: HashMap<String, Job>,
    order: Vec<String>,
}

impl JobRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job at the back of the queue. Returns false if the id exists.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.jobs.contains_key(&job.id) {
            return false;
        }
        self.order.push(job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        true
    }

    /// Insert a job at its `(created_at, id)` position in the queue.
    ///
    /// Used for jobs loaded from persistence, which may predate jobs already
    /// admitted. Ties keep existing jobs first. Returns false if the id exists.
    pub fn insert_ordered(&mut self, job: Job) -> bool {
        if self.jobs.contains_key(&job.id) {
            return false;
        }
        let key = (job.created_at, job.id.as_str());
        let jobs = &self.jobs;
        let at = self.order.partition_point(|id| {
            jobs.get(id)
                .map_or(true, |other| (other.created_at, other.id.as_str()) <= key)
        });
        self.order.insert(at, job.id.clone());
        self.jobs.insert(job.id.clone(), job);
        true
    }

    pub fn get(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    pub fn get_mut(&mut self, job_id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(job_id)
    }

    pub fn remove(&mut self, job_id: &str) -> Option<Job> {
        let job = self.jobs.remove(job_id)?;
        self.order.retain(|id| id != job_id);
        Some(job)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs in admission order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Job> + '_ {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    /// Jobs matching `filter`, most recently created first.
    pub fn newest_first<F>(&self, mut filter: F) -> Vec<Job>
    where
        F: FnMut(&Job) -> bool,
    {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| filter(*job))
            .cloned()
            .collect()
    }

    /// The oldest pending job, if any.
    pub fn oldest_pending(&self) -> Option<&Job> {
        self.iter().find(|job| job.status == JobStatus::Pending)
    }

    /// The job currently holding `running`, if any.
    pub fn running(&self) -> Option<&Job> {
        self.iter().find(|job| job.status == JobStatus::Running)
    }

    /// An active job of `job_type` whose payload deep-equals `payload`.
    pub fn find_similar_active(&self, job_type: JobType, payload: &JsonValue) -> Option<&Job> {
        self.iter().find(|job| {
            job.is_active() && job.job_type == job_type && payloads_equal(&job.payload, payload)
        })
    }

    pub fn has_active_of_type(&self, job_type: JobType) -> bool {
        self.iter()
            .any(|job| job.is_active() && job.job_type == job_type)
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|job| job.status == status).count()
    }

    /// Ids of every terminal job, oldest first.
    pub fn terminal_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|job| job.is_terminal())
            .map(|job| job.id.clone())
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for job in self.jobs.values() {
            stats.record(job.status);
        }
        stats
    }
}
