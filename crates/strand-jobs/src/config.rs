//! Scheduler configuration.

use strand_core::defaults::{JOB_ID_PREFIX, JOB_POLL_INTERVAL_MS};
use strand_core::sanitize_id_prefix;

/// Configuration for the job scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Safety-net polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Prefix for generated job ids. Characters that are not file-name safe
    /// are replaced with `-` (see [`sanitize_id_prefix`]).
    pub id_prefix: String,
    /// Whether `start_processing` actually starts the loop.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: JOB_POLL_INTERVAL_MS,
            id_prefix: JOB_ID_PREFIX.to_string(),
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_SCHEDULER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_POLL_INTERVAL_MS` | `1000` | Safety-net poll when no wake-up arrives |
    /// | `JOB_ID_PREFIX` | `job` | Prefix of generated job ids |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_SCHEDULER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(JOB_POLL_INTERVAL_MS)
            .max(1);

        let id_prefix = std::env::var("JOB_ID_PREFIX")
            .map(|v| sanitize_id_prefix(&v))
            .unwrap_or_else(|_| JOB_ID_PREFIX.to_string());

        Self {
            poll_interval_ms,
            id_prefix,
            enabled,
        }
    }

    /// Set the safety-net poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the prefix of generated job ids.
    pub fn with_id_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.id_prefix = sanitize_id_prefix(prefix.as_ref());
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
