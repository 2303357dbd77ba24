//! In-memory job store for tests and embedded use.

use super::{JobStore, StoreError};
use crate::job::JobState;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A process-local [`JobStore`] backed by a hash map.
///
/// Recency for [`list`](JobStore::list) is tracked with a monotonic
/// write counter.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    entries: RwLock<HashMap<Uuid, (u64, JobState)>>,
    seq: AtomicU64,
}

impl MemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, state: &JobState) -> Result<(), StoreError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .insert(state.job_id, (seq, state.clone()));
        Ok(())
    }

    async fn load(&self, job_id: Uuid) -> Result<JobState, StoreError> {
        self.entries
            .read()
            .get(&job_id)
            .map(|(_, state)| state.clone())
            .ok_or(StoreError::NotFound(job_id))
    }

    async fn list(&self, limit: usize) -> Result<Vec<JobState>, StoreError> {
        let mut entries: Vec<(u64, JobState)> =
            self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, state)| state)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;

    fn state() -> JobState {
        JobState::new(Uuid::new_v4(), sample_config())
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemoryJobStore::new();
        let state = state();

        store.save(&state).await.unwrap();
        let loaded = store.load(state.job_id).await.unwrap();
        assert_eq!(loaded.job_id, state.job_id);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemoryJobStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.load(missing).await,
            Err(StoreError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_list_orders_by_recency() {
        let store = MemoryJobStore::new();
        let first = state();
        let second = state();

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        // Re-saving bumps recency.
        store.save(&first).await.unwrap();

        let listed = store.list(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].job_id, first.job_id);
        assert_eq!(listed[1].job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let store = MemoryJobStore::new();
        for _ in 0..5 {
            store.save(&state()).await.unwrap();
        }
        assert_eq!(store.list(3).await.unwrap().len(), 3);
    }
}
