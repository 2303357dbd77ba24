//! Non-blocking progress projection.
//!
//! Progress is published through a `tokio::sync::watch` channel: the runner
//! task writes, any number of readers borrow the latest snapshot without
//! ever blocking pipeline execution. [`ProgressStream`] wraps a receiver
//! into a subscription that ends once a terminal snapshot has been
//! delivered.

use super::JobStage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// A read-only point-in-time view of a job's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Current stage.
    pub stage: JobStage,
    /// Monotonic percent in `[0, 100]`.
    pub percent: u8,
    /// Human-readable description of the current work.
    pub message: String,
    /// Short error description for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When this snapshot was published; doubles as the liveness heartbeat.
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Creates the initial snapshot for a job entering the state machine.
    #[must_use]
    pub fn initial(stage: JobStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent,
            message: message.into(),
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Returns true if no further snapshots will follow.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

/// Publisher side of a job's progress projection.
///
/// Cheap to clone; all clones publish into the same channel. The percent
/// never decreases: stage checkpoints only raise it and heartbeats leave
/// it untouched.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressTracker {
    /// Creates a tracker seeded with the given snapshot.
    #[must_use]
    pub fn new(initial: ProgressSnapshot) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Publishes a stage transition with its checkpoint percent.
    pub fn update(&self, stage: JobStage, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|snap| {
            snap.stage = stage;
            if let Some(pct) = stage.checkpoint_percent() {
                snap.percent = snap.percent.max(pct);
            }
            snap.message = message;
            snap.updated_at = Utc::now();
        });
    }

    /// Publishes a liveness heartbeat without changing stage or percent.
    pub fn heartbeat(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|snap| {
            snap.message = message;
            snap.updated_at = Utc::now();
        });
    }

    /// Publishes the failure terminal snapshot, freezing the percent.
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.tx.send_modify(|snap| {
            snap.stage = JobStage::Failed;
            snap.message = "Pipeline failed".to_string();
            snap.error = Some(error);
            snap.updated_at = Utc::now();
        });
    }

    /// Returns the latest snapshot without blocking.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    /// Opens a subscription that ends after the terminal snapshot.
    #[must_use]
    pub fn subscribe(&self) -> ProgressStream {
        ProgressStream {
            rx: self.tx.subscribe(),
            yielded_initial: false,
            done: false,
        }
    }

    /// Returns a raw receiver for callers that only need to await changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }
}

/// A subscription over a job's progress snapshots.
///
/// Yields the snapshot current at subscription time, then every published
/// change, and returns `None` after delivering a terminal snapshot.
#[derive(Debug)]
pub struct ProgressStream {
    rx: watch::Receiver<ProgressSnapshot>,
    yielded_initial: bool,
    done: bool,
}

impl ProgressStream {
    /// Waits for the next snapshot.
    pub async fn next(&mut self) -> Option<ProgressSnapshot> {
        if self.done {
            return None;
        }
        if !self.yielded_initial {
            self.yielded_initial = true;
            let snap = self.rx.borrow_and_update().clone();
            self.done = snap.is_terminal();
            return Some(snap);
        }
        match self.rx.changed().await {
            Ok(()) => {
                let snap = self.rx.borrow_and_update().clone();
                self.done = snap.is_terminal();
                Some(snap)
            }
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}
