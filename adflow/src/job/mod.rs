//! Job state and progress tracking.
//!
//! This module provides:
//! - The fixed-order stage enum with transition rules
//! - The durable job state aggregate
//! - The non-blocking progress projection and its stream

mod progress;
mod stage;
mod state;

pub use progress::{ProgressSnapshot, ProgressStream, ProgressTracker};
pub use stage::{JobStage, StageTransitionError};
pub use state::JobState;
