//! Job type → processor mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use strand_core::JobType;

use crate::processor::JobProcessor;

/// Registry of processors keyed by job type.
///
/// Registering a type twice replaces the earlier processor, so long-lived
/// sessions can hot-swap handlers. The registry keeps no job state.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<JobType, Arc<dyn JobProcessor>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for `job_type`. Returns true if it replaced one.
    pub fn register(&self, job_type: JobType, processor: Arc<dyn JobProcessor>) -> bool {
        let replaced = self
            .processors
            .write()
            .insert(job_type, processor)
            .is_some();
        debug!(%job_type, replaced, "Registered job processor");
        replaced
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobProcessor>> {
        self.processors.read().get(&job_type).cloned()
    }

    pub fn contains(&self, job_type: JobType) -> bool {
        self.processors.read().contains_key(&job_type)
    }

    /// Registered job types, in declaration order of [`JobType`].
    pub fn registered_types(&self) -> Vec<JobType> {
        let processors = self.processors.read();
        JobType::ALL
            .into_iter()
            .filter(|t| processors.contains_key(t))
            .collect()
    }
}
