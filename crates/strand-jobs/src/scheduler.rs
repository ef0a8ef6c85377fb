//! The job scheduler: queue, single-worker loop, cancellation and queries.
//!
//! All job state lives in an in-memory [`JobRecordStore`]; the optional
//! persistence adapter is written behind it on a best-effort basis.
//!
//! Three locks cooperate:
//!
//! - `transition` (async) serializes every status transition together with
//!   its persistence write, so the adapter sees writes in the same order as
//!   the store.
//! - the event bus delivery lock is held across each store mutation and the
//!   publish that describes it, so subscribers see events in mutation order.
//! - `state` (sync) guards the store itself and is never held across an
//!   `.await` or while events are delivered.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use strand_core::defaults::{
    JOB_PROGRESS_COMPLETE, MSG_CANCELLED_BY_USER, MSG_CANCELLING, MSG_NO_PROCESSOR,
    MSG_RESTORED_DUPLICATE,
};
use strand_core::{
    describe_panic, new_job_id, EnqueueOptions, Error, EventBus, Job, JobEvent, JobEventType,
    JobPatch, JobPersistence, JobStatus, JobType, QueueStats, Result, Subscription,
};

use crate::config::SchedulerConfig;
use crate::processor::{FnProcessor, JobContext, JobProcessor, JobResult};
use crate::registry::ProcessorRegistry;
use crate::store::JobRecordStore;

struct SchedulerState {
    store: JobRecordStore,
    /// Id and cancellation token of the job currently `running`.
    running: Option<(String, CancellationToken)>,
    /// Stop token of the active loop; `None` while stopped.
    loop_token: Option<CancellationToken>,
    /// Runtime the loop was started on; progress writes are spawned here.
    runtime: Option<tokio::runtime::Handle>,
    /// A progress write is queued and has not yet read the store.
    progress_flush_queued: bool,
}

struct SchedulerInner {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    transition: tokio::sync::Mutex<()>,
    registry: ProcessorRegistry,
    events: EventBus,
    persistence: Option<Arc<dyn JobPersistence>>,
    wake: Arc<Notify>,
}

/// Outcome of one claim attempt by the loop.
enum Claim {
    Idle,
    /// The oldest pending job had no processor and was failed in place.
    Unprocessable,
    Run {
        job: Job,
        processor: Arc<dyn JobProcessor>,
        token: CancellationToken,
    },
}

/// Background job scheduler.
///
/// Cloning is cheap; every clone drives the same queue.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<SchedulerInner>,
}

impl JobScheduler {
    /// Create a memory-only scheduler with no processors registered.
    pub fn new(config: SchedulerConfig) -> Self {
        SchedulerBuilder::new().with_config(config).build()
    }

    fn from_parts(
        config: SchedulerConfig,
        registry: ProcessorRegistry,
        events: EventBus,
        persistence: Option<Arc<dyn JobPersistence>>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                state: Mutex::new(SchedulerState {
                    store: JobRecordStore::new(),
                    running: None,
                    loop_token: None,
                    runtime: None,
                    progress_flush_queued: false,
                }),
                transition: tokio::sync::Mutex::new(()),
                registry,
                events,
                persistence,
                wake: Arc::new(Notify::new()),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // ------------------------------------------------------------------
    // Registration & events
    // ------------------------------------------------------------------

    /// Register a processor for `job_type`. Returns true if it replaced one.
    pub fn register_processor<P: JobProcessor + 'static>(
        &self,
        job_type: JobType,
        processor: P,
    ) -> bool {
        self.inner.registry.register(job_type, Arc::new(processor))
    }

    /// Register an async closure as the processor for `job_type`.
    pub fn register_fn<F, Fut, R>(&self, job_type: JobType, func: F) -> bool
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Into<JobResult> + 'static,
    {
        self.register_processor(job_type, FnProcessor::new(func))
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.inner.registry
    }

    /// Subscribe to lifecycle events. See [`EventBus::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&JobEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // ------------------------------------------------------------------
    // Enqueue
    // ------------------------------------------------------------------

    /// Add a job to the queue.
    ///
    /// Returns `None` without creating anything when an active job of the
    /// same type has a deep-equal payload (unless `options` allows
    /// duplicates); a `duplicate` event carrying the existing job is
    /// published instead.
    pub async fn enqueue(
        &self,
        job_type: JobType,
        payload: JsonValue,
        options: EnqueueOptions,
    ) -> Option<String> {
        let _transition = self.inner.transition.lock().await;

        let admitted = {
            let _delivery = self.inner.events.lock_delivery();
            let outcome = {
                let mut state = self.inner.state.lock();
                let existing = if options.allow_duplicates {
                    None
                } else {
                    state.store.find_similar_active(job_type, &payload).cloned()
                };
                match existing {
                    Some(existing) => Err(existing),
                    None => {
                        let job = Job::new(
                            new_job_id(&self.inner.config.id_prefix),
                            job_type,
                            payload,
                        );
                        state.store.insert(job.clone());
                        Ok(job)
                    }
                }
            };
            match outcome {
                Ok(job) => {
                    self.inner.events.publish(JobEventType::Created, job.clone());
                    Some(job)
                }
                Err(existing) => {
                    debug!(
                        job_id = %existing.id,
                        %job_type,
                        "Duplicate job suppressed; active job has the same payload"
                    );
                    self.inner.events.publish(JobEventType::Duplicate, existing);
                    None
                }
            }
        };

        let job = admitted?;
        self.persist_save(&job).await;
        info!(job_id = %job.id, %job_type, "Job enqueued");
        self.inner.wake.notify_one();
        Some(job.id)
    }

    // ------------------------------------------------------------------
    // Cancellation & deletion
    // ------------------------------------------------------------------

    /// Cancel a pending or running job.
    ///
    /// Returns false for unknown ids and jobs already terminal. A running
    /// job's processor is signalled through its cancellation token but not
    /// aborted; whatever it returns later is discarded.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let _transition = self.inner.transition.lock().await;

        let cancelled = {
            let _delivery = self.inner.events.lock_delivery();
            let cancelled = {
                let mut state = self.inner.state.lock();
                let Some(job) = state.store.get_mut(job_id) else {
                    return false;
                };
                if job.is_terminal() {
                    return false;
                }

                let was_running = job.status == JobStatus::Running;
                job.status = JobStatus::Cancelled;
                job.message = Some(
                    if was_running {
                        MSG_CANCELLING
                    } else {
                        MSG_CANCELLED_BY_USER
                    }
                    .to_string(),
                );
                job.completed_at = Some(Utc::now());
                let snapshot = job.clone();

                if was_running {
                    match state.running.take() {
                        Some((id, token)) if id == job_id => token.cancel(),
                        other => state.running = other,
                    }
                }
                snapshot
            };
            self.inner
                .events
                .publish(JobEventType::Cancelled, cancelled.clone());
            cancelled
        };

        info!(job_id = %cancelled.id, job_type = %cancelled.job_type, "Job cancelled");
        self.persist_update(&cancelled).await;
        self.inner.wake.notify_one();
        true
    }

    /// Delete a terminal job. Returns false for unknown or active jobs.
    pub async fn delete(&self, job_id: &str) -> bool {
        let _transition = self.inner.transition.lock().await;

        let removed = {
            let mut state = self.inner.state.lock();
            let terminal = state.store.get(job_id).is_some_and(Job::is_terminal);
            terminal && state.store.remove(job_id).is_some()
        };
        if !removed {
            return false;
        }

        debug!(%job_id, "Job deleted");
        self.persist_delete(job_id).await;
        true
    }

    /// Delete every terminal job. Returns how many were removed.
    pub async fn clear_terminal_jobs(&self) -> usize {
        let _transition = self.inner.transition.lock().await;

        let removed = {
            let mut state = self.inner.state.lock();
            let ids = state.store.terminal_ids();
            for id in &ids {
                state.store.remove(id);
            }
            ids
        };

        futures::future::join_all(removed.iter().map(|id| self.persist_delete(id))).await;
        if !removed.is_empty() {
            info!(count = removed.len(), "Cleared terminal jobs");
        }
        removed.len()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.inner.state.lock().store.get(job_id).cloned()
    }

    /// All jobs, most recently created first.
    pub fn get_jobs(&self) -> Vec<Job> {
        self.inner.state.lock().store.newest_first(|_| true)
    }

    /// Jobs with any of `statuses`, most recently created first.
    pub fn get_jobs_by_status(&self, statuses: &[JobStatus]) -> Vec<Job> {
        self.inner
            .state
            .lock()
            .store
            .newest_first(|job| statuses.contains(&job.status))
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .store
            .count_with_status(JobStatus::Pending)
    }

    pub fn running_job(&self) -> Option<Job> {
        self.inner.state.lock().store.running().cloned()
    }

    pub fn has_active_job_of_type(&self, job_type: JobType) -> bool {
        self.inner.state.lock().store.has_active_of_type(job_type)
    }

    /// Whether an active job of `job_type` has a payload deep-equal to `payload`.
    pub fn has_similar_job(&self, job_type: JobType, payload: &JsonValue) -> bool {
        self.inner
            .state
            .lock()
            .store
            .find_similar_active(job_type, payload)
            .is_some()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.inner.state.lock().store.stats()
    }

    /// Whether the processing loop is active.
    pub fn is_processing(&self) -> bool {
        self.inner.state.lock().loop_token.is_some()
    }

    // ------------------------------------------------------------------
    // Loop control
    // ------------------------------------------------------------------

    /// Start the processing loop on the current Tokio runtime.
    ///
    /// Idempotent. A logged no-op when the scheduler is disabled by config.
    /// Fails with [`Error::Internal`] when called outside a runtime.
    pub fn start_processing(&self) -> Result<()> {
        if !self.inner.config.enabled {
            info!("Job scheduler is disabled, not starting");
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            Error::Internal(format!("start_processing requires a Tokio runtime: {e}"))
        })?;

        let stop = {
            let mut state = self.inner.state.lock();
            if state.loop_token.is_some() {
                debug!("Job scheduler already processing");
                return Ok(());
            }
            let token = CancellationToken::new();
            state.loop_token = Some(token.clone());
            state.runtime = Some(handle.clone());
            token
        };

        let job_types = self.inner.registry.registered_types();
        debug!(?job_types, "Job processors registered");

        let guard = LoopGuard {
            scheduler: Arc::downgrade(&self.inner),
            stop: stop.clone(),
        };
        handle.spawn(run_loop(
            guard,
            self.inner.wake.clone(),
            stop,
            Duration::from_millis(self.inner.config.poll_interval_ms.max(1)),
        ));
        Ok(())
    }

    /// Stop claiming new jobs. The job in flight finishes normally.
    pub fn stop_processing(&self) {
        let token = {
            let mut state = self.inner.state.lock();
            state.runtime = None;
            state.loop_token.take()
        };
        if let Some(token) = token {
            info!("Job scheduler stopping");
            token.cancel();
        }
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Load jobs from the persistence adapter into the queue.
    ///
    /// Each job takes its `(created_at, id)` place in the queue, ahead of
    /// anything enqueued later. Jobs found `running` were interrupted and go
    /// back to `pending` with progress 0. Ids already known are skipped. An
    /// active job identical to one already active is stored as `cancelled`
    /// instead. Returns the number of jobs loaded.
    pub async fn restore(&self) -> Result<usize> {
        let Some(persistence) = self.inner.persistence.clone() else {
            return Ok(0);
        };
        let _transition = self.inner.transition.lock().await;

        let mut jobs = persistence.list(None).await?;
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut rewritten = Vec::new();
        let mut requeued = 0;
        let mut superseded = 0;
        let loaded = {
            let mut state = self.inner.state.lock();
            let mut loaded = 0;
            for mut job in jobs {
                if state.store.contains(&job.id) {
                    continue;
                }
                if job.is_active() {
                    let duplicate_of = state
                        .store
                        .find_similar_active(job.job_type, &job.payload)
                        .map(|existing| existing.id.clone());
                    if let Some(duplicate_of) = duplicate_of {
                        debug!(job_id = %job.id, %duplicate_of, "Restored job duplicates an active job");
                        job.status = JobStatus::Cancelled;
                        job.message = Some(MSG_RESTORED_DUPLICATE.to_string());
                        job.completed_at = Some(Utc::now());
                        rewritten.push(job.clone());
                        superseded += 1;
                    } else if job.status == JobStatus::Running {
                        job.status = JobStatus::Pending;
                        job.progress = 0;
                        job.message = None;
                        job.started_at = None;
                        rewritten.push(job.clone());
                        requeued += 1;
                    }
                }
                state.store.insert_ordered(job);
                loaded += 1;
            }
            loaded
        };

        for job in &rewritten {
            self.persist_save(job).await;
        }

        info!(loaded, requeued, superseded, "Restored jobs from persistence");
        self.inner.wake.notify_one();
        Ok(loaded)
    }

    // ------------------------------------------------------------------
    // Loop internals
    // ------------------------------------------------------------------

    /// Claim and run at most one job. Returns false when there was nothing
    /// to claim.
    async fn run_next(&self) -> bool {
        match self.claim_next().await {
            Claim::Idle => false,
            Claim::Unprocessable => true,
            Claim::Run {
                job,
                processor,
                token,
            } => {
                self.execute(job, processor, token).await;
                true
            }
        }
    }

    async fn claim_next(&self) -> Claim {
        let _transition = self.inner.transition.lock().await;

        let (claim, snapshot) = {
            let _delivery = self.inner.events.lock_delivery();
            let (claim, snapshot) = {
                let mut state = self.inner.state.lock();
                if state.store.running().is_some() {
                    return Claim::Idle;
                }
                let Some((job_id, job_type)) = state
                    .store
                    .oldest_pending()
                    .map(|job| (job.id.clone(), job.job_type))
                else {
                    return Claim::Idle;
                };
                let processor = self.inner.registry.get(job_type);
                let Some(job) = state.store.get_mut(&job_id) else {
                    return Claim::Idle;
                };

                match processor {
                    None => {
                        job.status = JobStatus::Failed;
                        job.error = Some(format!("{MSG_NO_PROCESSOR} {job_type}"));
                        job.completed_at = Some(Utc::now());
                        (Claim::Unprocessable, job.clone())
                    }
                    Some(processor) => {
                        job.status = JobStatus::Running;
                        job.started_at = Some(Utc::now());
                        let snapshot = job.clone();
                        let token = CancellationToken::new();
                        state.running = Some((job_id, token.clone()));
                        let claim = Claim::Run {
                            job: snapshot.clone(),
                            processor,
                            token,
                        };
                        (claim, snapshot)
                    }
                }
            };

            let event_type = match claim {
                Claim::Run { .. } => JobEventType::Started,
                _ => JobEventType::Failed,
            };
            self.inner.events.publish(event_type, snapshot.clone());
            (claim, snapshot)
        };

        if matches!(claim, Claim::Unprocessable) {
            warn!(
                job_id = %snapshot.id,
                job_type = %snapshot.job_type,
                "No processor registered for job type"
            );
        }
        self.persist_update(&snapshot).await;
        claim
    }

    async fn execute(&self, job: Job, processor: Arc<dyn JobProcessor>, token: CancellationToken) {
        let start = Instant::now();
        let job_id = job.id.clone();
        let job_type = job.job_type;

        info!(%job_id, %job_type, "Processing job");

        let weak = Arc::downgrade(&self.inner);
        let progress_job_id = job_id.clone();
        let ctx = JobContext::new(job)
            .with_cancellation(token.clone())
            .with_progress_callback(move |percent, message| {
                if let Some(inner) = weak.upgrade() {
                    JobScheduler { inner }.record_progress(&progress_job_id, percent, message);
                }
            });

        let mut task = tokio::spawn(async move { processor.process(ctx).await });

        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            _ = token.cancelled() => None,
        };

        let result = match joined {
            None => {
                debug!(
                    %job_id,
                    %job_type,
                    "Stopped waiting for cancelled job; its result will be discarded"
                );
                return;
            }
            Some(Ok(result)) => result,
            Some(Err(e)) if e.is_panic() => {
                let reason = describe_panic(e.into_panic().as_ref());
                error!(%job_id, %job_type, error = %reason, "Job processor panicked");
                JobResult::Failed(format!("Processor panicked: {reason}"))
            }
            Some(Err(e)) => JobResult::Failed(format!("Processor task aborted: {e}")),
        };

        self.resolve(&job_id, result, start).await;
    }

    /// Move a running job to its terminal state. Ignored if the job already
    /// left `running` (cancelled while the processor was finishing).
    async fn resolve(&self, job_id: &str, result: JobResult, start: Instant) {
        let _transition = self.inner.transition.lock().await;

        let resolved = {
            let _delivery = self.inner.events.lock_delivery();
            let resolved = {
                let mut state = self.inner.state.lock();
                if matches!(state.running, Some((ref id, _)) if id == job_id) {
                    state.running = None;
                }
                match state.store.get_mut(job_id) {
                    Some(job) if job.status == JobStatus::Running => {
                        match result {
                            JobResult::Success(value) => {
                                job.status = JobStatus::Completed;
                                job.progress = JOB_PROGRESS_COMPLETE;
                                job.result = value;
                            }
                            JobResult::Failed(error) => {
                                job.status = JobStatus::Failed;
                                job.error = Some(error);
                            }
                        }
                        job.completed_at = Some(Utc::now());
                        Some(job.clone())
                    }
                    _ => None,
                }
            };
            if let Some(ref job) = resolved {
                let event_type = match job.status {
                    JobStatus::Completed => JobEventType::Completed,
                    _ => JobEventType::Failed,
                };
                self.inner.events.publish(event_type, job.clone());
            }
            resolved
        };

        match resolved {
            Some(job) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                match job.error {
                    None => info!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        duration_ms,
                        "Job completed successfully"
                    ),
                    Some(ref error) => warn!(
                        job_id = %job.id,
                        job_type = %job.job_type,
                        %error,
                        duration_ms,
                        "Job failed"
                    ),
                }
                self.persist_update(&job).await;
            }
            None => debug!(%job_id, "Discarding result for job no longer running"),
        }

        self.inner.wake.notify_one();
    }

    /// Progress callback target. Ignored unless the job is still running.
    fn record_progress(&self, job_id: &str, percent: i32, message: Option<&str>) {
        let _delivery = self.inner.events.lock_delivery();
        let snapshot = {
            let mut state = self.inner.state.lock();
            match state.store.get_mut(job_id) {
                Some(job) if job.status == JobStatus::Running => {
                    job.progress = percent;
                    if let Some(message) = message {
                        job.message = Some(message.to_string());
                    }
                    Some(job.clone())
                }
                _ => None,
            }
        };

        match snapshot {
            Some(job) => {
                self.inner.events.publish(JobEventType::Progress, job);
            }
            None => {
                debug!(%job_id, percent, "Ignoring progress for job no longer running");
                return;
            }
        }

        if self.inner.persistence.is_some() {
            self.queue_progress_flush();
        }
    }

    /// Schedule a write of the running job's progress without blocking the
    /// caller. Reports arriving before the write reads the store share it.
    fn queue_progress_flush(&self) {
        let runtime = {
            let mut state = self.inner.state.lock();
            if state.progress_flush_queued {
                return;
            }
            let runtime = tokio::runtime::Handle::try_current()
                .ok()
                .or_else(|| state.runtime.clone());
            state.progress_flush_queued = runtime.is_some();
            runtime
        };

        match runtime {
            Some(runtime) => {
                let scheduler = self.clone();
                runtime.spawn(async move { scheduler.flush_progress().await });
            }
            None => debug!("No runtime for progress write; deferring to the next transition"),
        }
    }

    /// Write the current progress of the running job, if any.
    ///
    /// The store is read only after the transition lock is taken; a job that
    /// has left `running` by then is not written.
    async fn flush_progress(&self) {
        let _transition = self.inner.transition.lock().await;
        let running = {
            let mut state = self.inner.state.lock();
            state.progress_flush_queued = false;
            state.store.running().cloned()
        };

        if let Some(job) = running {
            let patch = JobPatch {
                progress: Some(job.progress),
                message: job.message.clone(),
                ..JobPatch::default()
            };
            self.persist_patch(&job, &patch).await;
        }
    }

    // ------------------------------------------------------------------
    // Persistence (best effort)
    // ------------------------------------------------------------------

    async fn persist_save(&self, job: &Job) {
        let Some(ref persistence) = self.inner.persistence else {
            return;
        };
        if let Err(e) = persistence.save(job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist job; continuing in memory");
        }
    }

    async fn persist_update(&self, job: &Job) {
        self.persist_patch(job, &JobPatch::from_job(job)).await;
    }

    /// Write `patch` for `job`, falling back to the full record.
    async fn persist_patch(&self, job: &Job, patch: &JobPatch) {
        let Some(ref persistence) = self.inner.persistence else {
            return;
        };
        match persistence.update(&job.id, patch).await {
            Ok(()) => {}
            // The initial save was lost; write the whole record instead.
            Err(Error::JobNotFound(_)) => self.persist_save(job).await,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to persist job update; continuing in memory")
            }
        }
    }

    async fn persist_delete(&self, job_id: &str) {
        let Some(ref persistence) = self.inner.persistence else {
            return;
        };
        if let Err(e) = persistence.delete(job_id).await {
            warn!(%job_id, error = %e, "Failed to delete persisted job");
        }
    }
}

/// Marks the scheduler stopped when its loop task goes away.
///
/// Owned by the loop future, so it also drops when the runtime shuts down
/// with the loop still alive, or before the task is ever polled.
struct LoopGuard {
    scheduler: Weak<SchedulerInner>,
    stop: CancellationToken,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        // A cancelled token was already taken by `stop_processing`, and a
        // newer loop may own the slot now.
        if self.stop.is_cancelled() {
            return;
        }
        if let Some(inner) = self.scheduler.upgrade() {
            let mut state = inner.state.lock();
            if state.loop_token.take().is_some() {
                state.runtime = None;
                debug!("Job scheduler loop ended without stop_processing");
            }
        }
    }
}

/// The processing loop.
///
/// Holds only a weak reference to the scheduler between iterations, so the
/// loop ends on its own once every [`JobScheduler`] handle is dropped.
#[instrument(skip_all, name = "job_scheduler")]
async fn run_loop(
    guard: LoopGuard,
    wake: Arc<Notify>,
    stop: CancellationToken,
    poll_interval: Duration,
) {
    info!(
        poll_interval_ms = poll_interval.as_millis() as u64,
        "Job scheduler started"
    );

    loop {
        if stop.is_cancelled() {
            break;
        }
        let Some(inner) = guard.scheduler.upgrade() else {
            debug!("Job scheduler dropped");
            break;
        };
        let worked = JobScheduler { inner }.run_next().await;
        if worked {
            continue;
        }

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = wake.notified() => {}
            _ = sleep(poll_interval) => {}
        }
    }

    // A wake-up consumed here may belong to a loop started after this one.
    wake.notify_one();
    info!("Job scheduler stopped");
}

/// Builder for creating a job scheduler with processors.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    processors: Vec<(JobType, Arc<dyn JobProcessor>)>,
    persistence: Option<Arc<dyn JobPersistence>>,
    events: Option<EventBus>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Create a new scheduler builder.
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            processors: Vec::new(),
            persistence: None,
            events: None,
        }
    }

    /// Set the scheduler configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a processor.
    pub fn with_processor<P: JobProcessor + 'static>(
        mut self,
        job_type: JobType,
        processor: P,
    ) -> Self {
        self.processors.push((job_type, Arc::new(processor)));
        self
    }

    /// Write jobs through to a persistence adapter.
    pub fn with_persistence(mut self, persistence: Arc<dyn JobPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Publish on an existing event bus instead of a fresh one.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Build and return the scheduler. The loop is not started.
    pub fn build(self) -> JobScheduler {
        let registry = ProcessorRegistry::new();
        for (job_type, processor) in self.processors {
            registry.register(job_type, processor);
        }
        JobScheduler::from_parts(
            self.config,
            registry,
            self.events.unwrap_or_default(),
            self.persistence,
        )
    }
}
