//! Filesystem-backed job store.
//!
//! One `<job_id>.json` file per job under a root directory. Saves write to
//! a temp file and rename into place, so a crash mid-save leaves the last
//! good snapshot loadable.

use super::{JobStore, StoreError};
use crate::job::JobState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;
use uuid::Uuid;

/// A durable [`JobStore`] keeping one JSON snapshot file per job.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created lazily on the first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, job_id: Uuid) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn save(&self, state: &JobState) -> Result<(), StoreError> {
        let path = self.path_for(state.job_id);
        let tmp = self.root.join(format!("{}.json.tmp", state.job_id));
        let bytes = serde_json::to_vec_pretty(state)?;

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, job_id: Uuid) -> Result<JobState, StoreError> {
        let path = self.path_for(job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(job_id));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list(&self, limit: usize) -> Result<Vec<JobState>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .await?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((modified, path));
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let mut states = Vec::new();
        for (_, path) in candidates.into_iter().take(limit) {
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<JobState>(&bytes) {
                Ok(state) => states.push(state),
                Err(err) => {
                    // A half-written or foreign file must not break listing.
                    warn!(path = %path.display(), error = %err, "Skipping unreadable job snapshot");
                }
            }
        }
        Ok(states)
    }
}
