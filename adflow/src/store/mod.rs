//! Durable job state storage.
//!
//! A [`JobStore`] keeps the latest full snapshot per job id. `save`
//! overwrites (no append-only log); the single-writer-per-job invariant
//! holds by construction because only the runner task driving a job ever
//! saves it.

mod file;
mod memory;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

use crate::job::JobState;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot exists for the job id.
    #[error("No stored state for job {0}")]
    NotFound(Uuid),

    /// Filesystem failure.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keyed-by-job-id snapshot storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Overwrites the stored snapshot for `state.job_id`.
    async fn save(&self, state: &JobState) -> Result<(), StoreError>;

    /// Loads the latest snapshot for the job.
    async fn load(&self, job_id: Uuid) -> Result<JobState, StoreError>;

    /// Returns up to `limit` snapshots, most recently modified first.
    async fn list(&self, limit: usize) -> Result<Vec<JobState>, StoreError>;
}
