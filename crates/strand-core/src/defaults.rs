//! Centralized default constants for the strand job scheduler.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Environment overrides are read by the config types that consume
//! them (see `SchedulerConfig::from_env`).

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Safety-net poll interval for the scheduler loop in milliseconds.
///
/// The loop is woken explicitly on enqueue, cancellation and job
/// resolution; the poll only covers wake-ups that were missed.
pub const JOB_POLL_INTERVAL_MS: u64 = 1_000;

/// Prefix for generated job ids (`<prefix>_<uuid>`).
pub const JOB_ID_PREFIX: &str = "job";

/// Progress value forced onto a job when it completes successfully.
pub const JOB_PROGRESS_COMPLETE: i32 = 100;

// =============================================================================
// JOB MESSAGES
// =============================================================================

/// Message set on a pending job cancelled before it started.
pub const MSG_CANCELLED_BY_USER: &str = "Cancelled by user";

/// Message set on a running job whose cancellation has been requested.
pub const MSG_CANCELLING: &str = "Cancelling...";

/// Message set on a restored job that duplicates a job already active.
pub const MSG_RESTORED_DUPLICATE: &str = "Cancelled on restore: an identical job is already active";

/// Error prefix for jobs whose type has no registered processor.
pub const MSG_NO_PROCESSOR: &str = "No processor registered for type";

// =============================================================================
// STORAGE
// =============================================================================

/// Default directory for the JSON file job store.
pub const JOB_STORE_DIR: &str = ".strand/jobs";
