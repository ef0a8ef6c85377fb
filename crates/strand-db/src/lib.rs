//! # strand-db
//!
//! Persistence adapters for strand job records.
//!
//! - [`MemoryJobStore`]: process-local store, for tests and memory-only hosts.
//! - [`FileJobStore`]: one JSON document per job in a directory, so queue
//!   state survives application reloads.
//!
//! Both implement [`strand_core::JobPersistence`].

pub mod file;
pub mod memory;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

/// Sort key shared by adapters: oldest first, id as tiebreak.
pub(crate) fn sort_oldest_first(jobs: &mut [strand_core::Job]) {
    jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
