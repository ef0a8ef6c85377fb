//! Core traits for strand abstractions.
//!
//! These traits define the interfaces that storage backends must satisfy,
//! enabling pluggable persistence and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Job, JobPatch, JobStatus};

// =============================================================================
// JOB PERSISTENCE TRAITS
// =============================================================================

/// Durable store for job records.
///
/// The scheduler treats persistence as best-effort: any error returned here
/// is logged and the in-memory state change stands.
#[async_trait]
pub trait JobPersistence: Send + Sync {
    /// Insert or replace a job record.
    async fn save(&self, job: &Job) -> Result<()>;

    /// Get a job by id.
    async fn get(&self, job_id: &str) -> Result<Option<Job>>;

    /// List jobs, optionally only those with `status`, oldest first.
    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>>;

    /// Apply a partial update. Fails with `JobNotFound` for unknown ids.
    async fn update(&self, job_id: &str, patch: &JobPatch) -> Result<()>;

    /// Delete a job record. Deleting an unknown id is not an error.
    async fn delete(&self, job_id: &str) -> Result<()>;
}
