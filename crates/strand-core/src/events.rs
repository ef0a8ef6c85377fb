//! Job lifecycle events and the event bus that fans them out.
//!
//! Every state change the scheduler makes is published as a [`JobEvent`]
//! carrying a snapshot of the job after the change. Delivery is synchronous:
//! `publish` returns once every subscriber has seen the event, and
//! subscribers observe events in publish order (see [`JobEvent::sequence`]).
//!
//! A subscriber that panics is logged and skipped. It never prevents
//! delivery to the remaining subscribers and never unwinds into the
//! publisher, so a faulty UI observer cannot break the scheduler loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::describe_panic;
use crate::models::Job;

// ============================================================================
// Job Event
// ============================================================================

/// Kind of lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEventType {
    /// A job was added to the queue.
    Created,
    /// A job moved to `running`.
    Started,
    /// A running job reported progress.
    Progress,
    /// A job completed successfully.
    Completed,
    /// A job failed.
    Failed,
    /// A job was cancelled (pending or running).
    Cancelled,
    /// An enqueue was suppressed; the event carries the existing job.
    Duplicate,
}

impl JobEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobEventType::Created => "created",
            JobEventType::Started => "started",
            JobEventType::Progress => "progress",
            JobEventType::Completed => "completed",
            JobEventType::Failed => "failed",
            JobEventType::Cancelled => "cancelled",
            JobEventType::Duplicate => "duplicate",
        }
    }

    /// Dot-namespaced name (e.g. `"job.completed"`) for external consumers.
    pub fn namespaced(self) -> &'static str {
        match self {
            JobEventType::Created => "job.created",
            JobEventType::Started => "job.started",
            JobEventType::Progress => "job.progress",
            JobEventType::Completed => "job.completed",
            JobEventType::Failed => "job.failed",
            JobEventType::Cancelled => "job.cancelled",
            JobEventType::Duplicate => "job.duplicate",
        }
    }
}

/// A lifecycle notification.
///
/// Serialized as JSON with a `type` field, e.g.
/// `{"type":"progress","job":{...},"timestamp":"...","sequence":7}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "type")]
    pub event_type: JobEventType,
    /// Snapshot of the job taken right after the change.
    pub job: Job,
    pub timestamp: DateTime<Utc>,
    /// Monotonic per-bus publish counter. Delivery order equals sequence order.
    pub sequence: u64,
}

impl JobEvent {
    /// The job's current activity message, if any.
    pub fn message(&self) -> Option<&str> {
        self.job.message.as_deref()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Subscriber callback.
pub type EventCallback = Arc<dyn Fn(&JobEvent) + Send + Sync>;

struct BusInner {
    subscribers: RwLock<Vec<(u64, EventCallback)>>,
    next_subscriber_id: AtomicU64,
    sequence: AtomicU64,
    /// Serializes delivery so concurrent publishers cannot interleave.
    /// Reentrant: a subscriber may publish (e.g. by enqueueing a job).
    delivery: ReentrantMutex<()>,
}

/// Synchronous fan-out of [`JobEvent`]s to callback subscribers.
///
/// Cloning is cheap and yields a handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                sequence: AtomicU64::new(0),
                delivery: ReentrantMutex::new(()),
            }),
        }
    }

    /// Register a callback for every subsequently published event.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called. Use
    /// [`Subscription::detach`] to keep it for the lifetime of the bus.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&JobEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push((id, Arc::new(callback)));
        trace!(subscriber_id = id, "EventBus subscribe");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Publish an event about `job` to every current subscriber.
    ///
    /// Returns the published event.
    pub fn publish(&self, event_type: JobEventType, job: Job) -> JobEvent {
        let _delivery = self.inner.delivery.lock();

        let event = JobEvent {
            event_type,
            job,
            timestamp: Utc::now(),
            sequence: self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };

        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking.
        let subscribers: Vec<(u64, EventCallback)> = self.inner.subscribers.read().clone();

        trace!(
            event_type = event_type.namespaced(),
            job_id = %event.job.id,
            sequence = event.sequence,
            subscriber_count = subscribers.len(),
            "EventBus publish"
        );

        for (id, callback) in subscribers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                warn!(
                    subscriber_id = id,
                    event_type = event_type.as_str(),
                    job_id = %event.job.id,
                    error = %describe_panic(panic.as_ref()),
                    "Event subscriber panicked; continuing delivery"
                );
            }
        }

        event
    }

    /// Hold delivery order across a state change and the publish describing it.
    ///
    /// While the guard lives no other thread can publish, so observers see
    /// events in the same order the underlying changes were made. The lock
    /// is reentrant: `publish` may be called while holding it.
    pub fn lock_delivery(&self) -> DeliveryGuard<'_> {
        DeliveryGuard {
            _guard: self.inner.delivery.lock(),
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

/// Guard returned by [`EventBus::lock_delivery`].
pub struct DeliveryGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

/// Handle keeping an [`EventBus`] callback registered.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: Option<u64>,
}

impl Subscription {
    /// Remove the callback. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the callback registered for as long as the bus lives.
    pub fn detach(mut self) {
        self.id = None;
    }

    fn remove(&mut self) {
        let (Some(id), Some(bus)) = (self.id.take(), self.bus.upgrade()) else {
            return;
        };
        bus.subscribers.write().retain(|(sub_id, _)| *sub_id != id);
        trace!(subscriber_id = id, "EventBus unsubscribe");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, JobType};
    use parking_lot::Mutex;
    use serde_json::json;

    fn job(id: &str) -> Job {
        Job::new(id, JobType::FlashcardGeneration, json!({"strandId": "a"}))
    }

    fn recorder(bus: &EventBus) -> (Subscription, Arc<Mutex<Vec<JobEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = bus.subscribe(move |event| sink.lock().push(event.clone()));
        (sub, seen)
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let (_sub1, seen1) = recorder(&bus);
        let (_sub2, seen2) = recorder(&bus);

        bus.publish(JobEventType::Created, job("job_1"));

        assert_eq!(seen1.lock().len(), 1);
        assert_eq!(seen2.lock().len(), 1);
        assert_eq!(seen1.lock()[0].event_type, JobEventType::Created);
        assert_eq!(seen2.lock()[0].job.id, "job_1");
    }

    #[test]
    fn test_events_delivered_in_publish_order() {
        let bus = EventBus::new();
        let (_sub, seen) = recorder(&bus);

        bus.publish(JobEventType::Created, job("job_1"));
        bus.publish(JobEventType::Started, job("job_1"));
        bus.publish(JobEventType::Progress, job("job_1"));
        bus.publish(JobEventType::Completed, job("job_1"));

        let seen = seen.lock();
        let kinds: Vec<_> = seen.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                JobEventType::Created,
                JobEventType::Started,
                JobEventType::Progress,
                JobEventType::Completed
            ]
        );
        let sequences: Vec<_> = seen.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let (_before, seen_before) = recorder(&bus);
        let _bad = bus.subscribe(|_| panic!("observer bug"));
        let (_after, seen_after) = recorder(&bus);

        let event = bus.publish(JobEventType::Failed, job("job_1"));
        bus.publish(JobEventType::Cancelled, job("job_2"));

        assert_eq!(event.sequence, 1);
        assert_eq!(seen_before.lock().len(), 2);
        assert_eq!(seen_after.lock().len(), 2);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let (sub, seen) = recorder(&bus);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(JobEventType::Created, job("job_1"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_explicit_unsubscribe_only_removes_own_callback() {
        let bus = EventBus::new();
        let (sub1, seen1) = recorder(&bus);
        let (_sub2, seen2) = recorder(&bus);

        sub1.unsubscribe();
        bus.publish(JobEventType::Created, job("job_1"));

        assert!(seen1.lock().is_empty());
        assert_eq!(seen2.lock().len(), 1);
    }

    #[test]
    fn test_detach_keeps_callback() {
        let bus = EventBus::new();
        let (sub, seen) = recorder(&bus);
        sub.detach();

        bus.publish(JobEventType::Created, job("job_1"));
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_subscription_outliving_bus_is_harmless() {
        let bus = EventBus::new();
        let (sub, _seen) = recorder(&bus);
        drop(bus);
        sub.unsubscribe();
    }

    #[test]
    fn test_subscriber_may_publish_and_subscribe_reentrantly() {
        let bus = EventBus::new();
        let (_sub, seen) = recorder(&bus);

        let inner_bus = bus.clone();
        let late_subs = Arc::new(Mutex::new(Vec::new()));
        let late_subs_clone = late_subs.clone();
        let _chain = bus.subscribe(move |event| {
            if event.event_type == JobEventType::Created {
                let mut dup = event.job.clone();
                dup.status = JobStatus::Pending;
                inner_bus.publish(JobEventType::Duplicate, dup);
                late_subs_clone.lock().push(inner_bus.subscribe(|_| {}));
            }
        });

        bus.publish(JobEventType::Created, job("job_1"));

        let kinds: Vec<_> = seen.lock().iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![JobEventType::Created, JobEventType::Duplicate]);
        assert_eq!(late_subs.lock().len(), 1);
    }

    #[test]
    fn test_lock_delivery_orders_concurrent_publishers() {
        let bus = EventBus::new();
        let (_sub, seen) = recorder(&bus);

        let guard = bus.lock_delivery();
        let other = bus.clone();
        let handle = std::thread::spawn(move || {
            other.publish(JobEventType::Progress, job("job_2"));
        });
        // Reentrant for the holder.
        bus.publish(JobEventType::Created, job("job_1"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(seen.lock().len(), 1);
        drop(guard);
        handle.join().unwrap();

        let kinds: Vec<_> = seen.lock().iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![JobEventType::Created, JobEventType::Progress]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let event = bus.publish(JobEventType::Created, job("job_1"));
        assert_eq!(event.sequence, 1);
    }

    #[test]
    fn test_event_json_serialization() {
        let bus = EventBus::new();
        let mut j = job("job_1");
        j.message = Some("Cancelled by user".to_string());
        let event = bus.publish(JobEventType::Cancelled, j);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"cancelled""#));
        assert!(json.contains(r#""sequence":1"#));
        assert_eq!(event.message(), Some("Cancelled by user"));
    }

    #[test]
    fn test_namespaced_event_types() {
        assert_eq!(JobEventType::Created.namespaced(), "job.created");
        assert_eq!(JobEventType::Duplicate.namespaced(), "job.duplicate");
        assert_eq!(JobEventType::Progress.as_str(), "progress");
    }
}
