//! Processor contract: what the scheduler runs for each job type.

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use strand_core::{Job, JobType};

/// Progress callback type for processors.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to processors.
pub struct JobContext {
    /// Snapshot of the job taken when it moved to `running`.
    pub job: Job,
    /// Progress callback for updating job progress.
    progress_callback: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            progress_callback: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Set the token that is fired when the job is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Report progress to the callback.
    ///
    /// Ignored by the scheduler once the job has left `running`.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Whether cancellation of this job has been requested.
    ///
    /// Cancellation is advisory: the scheduler has already marked the job
    /// cancelled and will discard whatever this processor returns. Checking
    /// the flag only lets the processor stop wasting work.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    pub fn job_type(&self) -> JobType {
        self.job.job_type
    }

    /// Get the job payload.
    pub fn payload(&self) -> &JsonValue {
        &self.job.payload
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

impl<E: Display> From<Result<JsonValue, E>> for JobResult {
    fn from(result: Result<JsonValue, E>) -> Self {
        match result {
            Ok(value) => JobResult::Success(Some(value)),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

impl<E: Display> From<Result<(), E>> for JobResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => JobResult::Success(None),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

/// Trait for job processors.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Execute the job.
    async fn process(&self, ctx: JobContext) -> JobResult;
}

/// Adapts an async closure into a [`JobProcessor`].
///
/// The closure may return a [`JobResult`] or any `Result<Value, E>` /
/// `Result<(), E>` with a displayable error, so `anyhow::Result` works.
pub struct FnProcessor<F, Fut, R> {
    func: F,
    _marker: PhantomData<fn() -> (Fut, R)>,
}

impl<F, Fut, R> FnProcessor<F, Fut, R>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: Into<JobResult>,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, R> JobProcessor for FnProcessor<F, Fut, R>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
    R: Into<JobResult>,
{
    async fn process(&self, ctx: JobContext) -> JobResult {
        (self.func)(ctx).await.into()
    }
}

/// Wraps a processor with a deadline.
///
/// The scheduler itself never times jobs out; callers that want a deadline
/// register the processor wrapped in this type. Expiry is reported as an
/// ordinary failure.
pub struct WithTimeout<P> {
    inner: P,
    timeout: Duration,
}

impl<P: JobProcessor> WithTimeout<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: JobProcessor> JobProcessor for WithTimeout<P> {
    async fn process(&self, ctx: JobContext) -> JobResult {
        match tokio::time::timeout(self.timeout, self.inner.process(ctx)).await {
            Ok(result) => result,
            Err(_) => JobResult::Failed(format!(
                "Job exceeded timeout of {}s",
                self.timeout.as_secs_f64()
            )),
        }
    }
}

/// No-op processor for testing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProcessor;

#[async_trait]
impl JobProcessor for NoOpProcessor {
    async fn process(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(50, Some("Processing..."));
        ctx.report_progress(100, Some("Done"));
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn job() -> Job {
        Job::new("job_1", JobType::GlossaryGeneration, json!({"strandId": "a"}))
    }

    #[test]
    fn test_job_context_new() {
        let ctx = JobContext::new(job());
        assert_eq!(ctx.job.id, "job_1");
        assert_eq!(ctx.job_type(), JobType::GlossaryGeneration);
        assert_eq!(ctx.payload()["strandId"], "a");
        assert!(ctx.progress_callback.is_none());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_job_context_report_progress_no_callback() {
        let ctx = JobContext::new(job());
        // Should not panic
        ctx.report_progress(50, Some("test"));
        ctx.report_progress(100, None);
    }

    #[test]
    fn test_job_context_with_progress_callback() {
        let progress_log = Arc::new(Mutex::new(Vec::new()));
        let progress_log_clone = progress_log.clone();

        let ctx = JobContext::new(job()).with_progress_callback(move |percent, message| {
            progress_log_clone
                .lock()
                .unwrap()
                .push((percent, message.map(String::from)));
        });

        ctx.report_progress(25, Some("Starting"));
        ctx.report_progress(50, Some("Halfway"));
        ctx.report_progress(100, None);

        let log = progress_log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], (25, Some("Starting".to_string())));
        assert_eq!(log[1], (50, Some("Halfway".to_string())));
        assert_eq!(log[2], (100, None));
    }

    #[tokio::test]
    async fn test_job_context_observes_cancellation() {
        let token = CancellationToken::new();
        let ctx = JobContext::new(job()).with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
        // Resolves immediately once cancelled.
        ctx.cancelled().await;
    }

    #[tokio::test]
    async fn test_noop_processor_reports_progress() {
        let progress_log = Arc::new(Mutex::new(Vec::new()));
        let progress_log_clone = progress_log.clone();
        let ctx = JobContext::new(job()).with_progress_callback(move |percent, message| {
            progress_log_clone
                .lock()
                .unwrap()
                .push((percent, message.map(String::from)));
        });

        let result = NoOpProcessor.process(ctx).await;
        assert!(matches!(result, JobResult::Success(None)));

        let log = progress_log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], (50, Some("Processing...".to_string())));
        assert_eq!(log[1], (100, Some("Done".to_string())));
    }

    #[tokio::test]
    async fn test_fn_processor_success() {
        let processor = FnProcessor::new(|ctx: JobContext| async move {
            ctx.report_progress(50, Some("Halfway"));
            Ok::<_, anyhow::Error>(json!({"n": 10}))
        });

        match processor.process(JobContext::new(job())).await {
            JobResult::Success(Some(value)) => assert_eq!(value["n"], 10),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fn_processor_error_becomes_failure() {
        let processor = FnProcessor::new(|_ctx: JobContext| async move {
            Err::<JsonValue, _>(anyhow::anyhow!("model unavailable"))
        });

        match processor.process(JobContext::new(job())).await {
            JobResult::Failed(msg) => assert_eq!(msg, "model unavailable"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fn_processor_unit_result() {
        let processor =
            FnProcessor::new(|_ctx: JobContext| async move { Ok::<(), String>(()) });
        assert!(matches!(
            processor.process(JobContext::new(job())).await,
            JobResult::Success(None)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_fails_slow_processor() {
        let slow = FnProcessor::new(|_ctx: JobContext| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            JobResult::Success(None)
        });
        let processor = WithTimeout::new(slow, Duration::from_secs(5));

        match processor.process(JobContext::new(job())).await {
            JobResult::Failed(msg) => assert_eq!(msg, "Job exceeded timeout of 5s"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_passes_fast_result_through() {
        let processor = WithTimeout::new(NoOpProcessor, Duration::from_secs(5));
        assert!(matches!(
            processor.process(JobContext::new(job())).await,
            JobResult::Success(None)
        ));
    }

    #[test]
    fn test_job_result_from_result() {
        let ok: JobResult = Ok::<_, String>(json!({"status": "ok"})).into();
        assert!(matches!(ok, JobResult::Success(Some(_))));

        let err: JobResult = Err::<JsonValue, _>("boom".to_string()).into();
        assert!(matches!(err, JobResult::Failed(ref m) if m == "boom"));
    }
}
