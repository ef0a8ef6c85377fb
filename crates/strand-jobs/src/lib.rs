//! # strand-jobs
//!
//! Background job scheduler for strand.
//!
//! This crate provides:
//! - FIFO job queueing with active-duplicate suppression
//! - A single-worker processing loop on the Tokio runtime
//! - Progress tracking and lifecycle notifications via the event bus
//! - Advisory cancellation of pending and running jobs
//! - Best-effort write-through to a persistence adapter, and restore
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use strand_jobs::{EnqueueOptions, JobContext, JobType, SchedulerBuilder, SchedulerConfig};
//! use strand_db::FileJobStore;
//!
//! let store = FileJobStore::from_env().await?;
//!
//! let scheduler = SchedulerBuilder::new()
//!     .with_config(SchedulerConfig::from_env())
//!     .with_persistence(Arc::new(store))
//!     .build();
//!
//! scheduler.register_fn(JobType::FlashcardGeneration, |ctx: JobContext| async move {
//!     ctx.report_progress(50, Some("Generating cards"));
//!     Ok::<_, anyhow::Error>(json!({"cards": 12}))
//! });
//!
//! // Keep the subscription alive for as long as events should be delivered.
//! let _events = scheduler.subscribe(|event| println!("{}: {}", event.event_type.namespaced(), event.job.id));
//!
//! scheduler.restore().await?;
//! scheduler.start_processing()?;
//!
//! scheduler
//!     .enqueue(JobType::FlashcardGeneration, json!({"strandId": "s1"}), EnqueueOptions::default())
//!     .await;
//! ```

pub mod config;
pub mod processor;
pub mod registry;
pub mod scheduler;
pub mod store;

// Re-export core types
pub use strand_core::*;

pub use config::SchedulerConfig;
pub use processor::{
    FnProcessor, JobContext, JobProcessor, JobResult, NoOpProcessor, ProgressCallback,
    WithTimeout,
};
pub use registry::ProcessorRegistry;
pub use scheduler::{JobScheduler, SchedulerBuilder};
pub use store::JobRecordStore;
