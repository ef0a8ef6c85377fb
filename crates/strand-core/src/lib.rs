//! # strand-core
//!
//! Core types, traits, and abstractions for the strand background job
//! scheduler.
//!
//! This crate provides the job data model, the event bus used to fan out
//! lifecycle notifications, and the persistence trait that storage
//! adapters implement. The scheduler itself lives in `strand-jobs`.

pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod payload;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{describe_panic, Error, Result};
pub use events::{DeliveryGuard, EventBus, JobEvent, JobEventType, Subscription};
pub use models::*;
pub use payload::payloads_equal;
pub use traits::*;
pub use uuid_utils::{is_portable_id, new_job_id, new_v7, sanitize_id_prefix};
