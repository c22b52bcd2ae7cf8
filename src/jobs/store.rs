//! Job store abstraction
//!
//! Records are held as `Arc<JobRecord>` snapshots. Writers build a new record
//! and swap it in; readers clone the `Arc` and never see a half-written job.

use crate::jobs::types::{JobId, JobRecord};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job {0} already exists")]
    Duplicate(JobId),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for job records
pub trait JobStore: Send + Sync {
    /// Inserts a new record; fails if the id is taken
    fn create(&self, record: JobRecord) -> Result<(), JobStoreError>;

    /// Current snapshot of a job, if it exists
    fn snapshot(&self, id: &JobId) -> Option<Arc<JobRecord>>;

    /// Applies `f` to a copy of the record and swaps the copy in atomically
    ///
    /// Returns the new snapshot, or `None` for an unknown id.
    fn update(
        &self,
        id: &JobId,
        f: &mut dyn FnMut(&mut JobRecord),
    ) -> Option<Arc<JobRecord>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local job store
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Arc<JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, record: JobRecord) -> Result<(), JobStoreError> {
        use dashmap::mapref::entry::Entry;

        match self.jobs.entry(record.id) {
            Entry::Occupied(_) => Err(JobStoreError::Duplicate(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(record));
                Ok(())
            }
        }
    }

    fn snapshot(&self, id: &JobId) -> Option<Arc<JobRecord>> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn update(
        &self,
        id: &JobId,
        f: &mut dyn FnMut(&mut JobRecord),
    ) -> Option<Arc<JobRecord>> {
        // The shard write lock is held for the whole read-modify-swap
        let mut entry = self.jobs.get_mut(id)?;
        let mut next = JobRecord::clone(entry.value());
        f(&mut next);
        let next = Arc::new(next);
        *entry.value_mut() = Arc::clone(&next);
        Some(next)
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}
