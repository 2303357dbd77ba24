//! Process-scoped job registry.
//!
//! The registry is explicit state owned by the engine instance — never a
//! global — so engines stay independently instantiable and testable. Each
//! entry holds the shared pieces queries and signals need while the runner
//! task owns execution.

use crate::approval::ApprovalSignal;
use crate::cancellation::CancelToken;
use crate::job::{JobState, ProgressStream, ProgressTracker};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to one job.
///
/// The runner task is the single writer of `state`; everything here is
/// safe to read concurrently without resuming the pipeline.
#[derive(Clone)]
pub struct JobHandle {
    /// Shared job state; runner-written, reader-cloned.
    pub state: Arc<RwLock<JobState>>,
    /// Progress publisher for the job.
    pub tracker: ProgressTracker,
    /// Approval signal; decides the gate exactly once.
    pub approval: Arc<ApprovalSignal>,
    /// Cooperative cancellation token.
    pub cancel: Arc<CancelToken>,
}

impl JobHandle {
    /// Returns a cloned snapshot of the job state.
    #[must_use]
    pub fn state_snapshot(&self) -> JobState {
        self.state.read().clone()
    }

    /// Opens a progress subscription for the job.
    #[must_use]
    pub fn subscribe(&self) -> ProgressStream {
        self.tracker.subscribe()
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("JobHandle")
            .field("job_id", &state.job_id)
            .field("stage", &state.stage)
            .finish()
    }
}

/// Thread-safe map of active and finished jobs for one engine instance.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, JobHandle>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job handle.
    pub fn insert(&self, job_id: Uuid, handle: JobHandle) {
        self.jobs.insert(job_id, handle);
    }

    /// Returns the handle for a job, if registered.
    #[must_use]
    pub fn get(&self, job_id: Uuid) -> Option<JobHandle> {
        self.jobs.get(&job_id).map(|entry| entry.clone())
    }

    /// Returns true if the job is registered.
    #[must_use]
    pub fn contains(&self, job_id: Uuid) -> bool {
        self.jobs.contains_key(&job_id)
    }

    /// Returns the number of registered jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no jobs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
