//! Job data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Pending or running.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Completed, failed or cancelled. Terminal states are never left.
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown job status: {s}")))
    }
}

/// Kind of background task. Selects the processor that runs the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// Generate flashcards from a strand's content
    FlashcardGeneration,
    /// Generate a glossary of key terms
    GlossaryGeneration,
    /// Generate a quiz
    QuizGeneration,
    /// Suggest categories/tags for content
    Categorization,
    /// Import a markdown vault
    ImportMarkdown,
    /// Import a JSON export
    ImportJson,
    /// Export content as markdown
    ExportMarkdown,
    /// Export flashcards as an Anki deck
    ExportAnki,
    /// Render content to PDF
    ExportPdf,
    /// Publish content to a GitHub repository
    PublishGithub,
}

impl JobType {
    pub const ALL: [JobType; 10] = [
        JobType::FlashcardGeneration,
        JobType::GlossaryGeneration,
        JobType::QuizGeneration,
        JobType::Categorization,
        JobType::ImportMarkdown,
        JobType::ImportJson,
        JobType::ExportMarkdown,
        JobType::ExportAnki,
        JobType::ExportPdf,
        JobType::PublishGithub,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FlashcardGeneration => "flashcard-generation",
            JobType::GlossaryGeneration => "glossary-generation",
            JobType::QuizGeneration => "quiz-generation",
            JobType::Categorization => "categorization",
            JobType::ImportMarkdown => "import-markdown",
            JobType::ImportJson => "import-json",
            JobType::ExportMarkdown => "export-markdown",
            JobType::ExportAnki => "export-anki",
            JobType::ExportPdf => "export-pdf",
            JobType::PublishGithub => "publish-github",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|job_type| job_type.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown job type: {s}")))
    }
}

/// A job in the processing queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    #[serde(default)]
    pub payload: JsonValue,
    pub status: JobStatus,
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job with zero progress.
    pub fn new(id: impl Into<String>, job_type: JobType, payload: JsonValue) -> Self {
        Self {
            id: id.into(),
            job_type,
            payload,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial update applied to a stored job record.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobPatch {
    /// Patch carrying every mutable field of `job`.
    ///
    /// Used when the scheduler has just moved a job to a new status and
    /// wants the stored copy to match its in-memory record.
    pub fn from_job(job: &Job) -> Self {
        Self {
            status: Some(job.status),
            progress: Some(job.progress),
            message: job.message.clone(),
            error: job.error.clone(),
            result: job.result.clone(),
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == JobPatch::default()
    }

    /// Apply the set fields to `job`.
    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(ref message) = self.message {
            job.message = Some(message.clone());
        }
        if let Some(ref error) = self.error {
            job.error = Some(error.clone());
        }
        if let Some(ref result) = self.result {
            job.result = Some(result.clone());
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = Some(completed_at);
        }
    }
}

/// Options for `enqueue`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Skip the active-duplicate check and always create a new job.
    pub allow_duplicates: bool,
}

impl EnqueueOptions {
    pub fn allow_duplicates() -> Self {
        Self {
            allow_duplicates: true,
        }
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl QueueStats {
    /// Count a job with the given status.
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
        self.total += 1;
    }

    pub fn active(&self) -> usize {
        self.pending + self.running
    }
}
