//! The durable job state aggregate.

use super::{JobStage, StageTransitionError};
use crate::config::PipelineConfig;
use crate::providers::{BrandProfile, ComposedAd, CopyVariant, ImageMatch, VariantScore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The full state of one pipeline run.
///
/// `JobState` is the aggregate root persisted after every stage transition.
/// It is mutated exclusively by the runner task driving the job; everyone
/// else reads cloned snapshots. Once a terminal stage is reached the state
/// refuses further transitions and becomes a read-only artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: Uuid,
    /// The config the run was started with.
    pub config: PipelineConfig,
    /// Current stage in the fixed order.
    pub stage: JobStage,
    /// Monotonic progress percent in `[0, 100]`.
    pub percent: u8,
    /// Human-readable description of what the job is doing.
    pub message: String,
    /// Short error description once the job has failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Brand profile from the extraction stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<BrandProfile>,
    /// Copy variants from the generation stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<CopyVariant>,
    /// Image matches from the matching stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<ImageMatch>,
    /// Composed ads from the composition stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ads: Vec<ComposedAd>,
    /// Non-fatal per-item warnings collected during composition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Variant scores from the scoring stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<VariantScore>,
    /// Variants approved by the explicit approval signal.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub approved_variant_ids: BTreeSet<Uuid>,
    /// Reference returned by the best-effort campaign side-channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_ref: Option<String>,
    /// When the run entered the state machine.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration of the run in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl JobState {
    /// Creates a fresh pending job state.
    #[must_use]
    pub fn new(job_id: Uuid, config: PipelineConfig) -> Self {
        Self {
            job_id,
            config,
            stage: JobStage::Pending,
            percent: 0,
            message: "Queued".to_string(),
            error: None,
            profile: None,
            variants: Vec::new(),
            matches: Vec::new(),
            ads: Vec::new(),
            warnings: Vec::new(),
            scores: Vec::new(),
            approved_variant_ids: BTreeSet::new(),
            campaign_ref: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Returns true if the job has reached a terminal stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Advances to the next stage, enforcing the fixed total order.
    ///
    /// Raises the percent to the stage's checkpoint (never lowers it).
    pub fn advance(&mut self, next: JobStage) -> Result<(), StageTransitionError> {
        if !self.stage.can_transition_to(next) {
            return Err(StageTransitionError {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        if let Some(pct) = next.checkpoint_percent() {
            self.percent = self.percent.max(pct);
        }
        Ok(())
    }

    /// Moves the job to `Failed`, retaining all prior stage results.
    ///
    /// No-op when the job is already terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.advance(JobStage::Failed).is_ok() {
            let error = error.into();
            self.message = "Pipeline failed".to_string();
            self.error = Some(error);
            self.finish();
        }
    }

    /// Moves the job to `Cancelled`, retaining all prior stage results.
    ///
    /// No-op when the job is already terminal.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.advance(JobStage::Cancelled).is_ok() {
            self.message = reason.into();
            self.finish();
        }
    }

    /// Stamps `completed_at` and the derived duration.
    ///
    /// The exit timestamp is read once here, never repeatedly, so
    /// persisted checkpoints reconstruct elapsed time deterministically.
    pub fn finish(&mut self) {
        let finished_at = Utc::now();
        self.completed_at = Some(finished_at);
        self.duration_ms = Some((finished_at - self.started_at).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_config, sample_profile, sample_variants};

    fn pending_state() -> JobState {
        JobState::new(Uuid::new_v4(), sample_config())
    }

    #[test]
    fn test_new_state_is_pending() {
        let state = pending_state();
        assert_eq!(state.stage, JobStage::Pending);
        assert_eq!(state.percent, 0);
        assert!(!state.is_terminal());
        assert!(state.completed_at.is_none());
    }

    #[test]
    fn test_advance_raises_percent_to_checkpoint() {
        let mut state = pending_state();
        state.advance(JobStage::Extracting).unwrap();
        assert_eq!(state.percent, 10);
        state.advance(JobStage::Generating).unwrap();
        assert_eq!(state.percent, 25);
    }

    #[test]
    fn test_advance_rejects_skips() {
        let mut state = pending_state();
        assert!(state.advance(JobStage::Scoring).is_err());
        assert_eq!(state.stage, JobStage::Pending);
    }

    #[test]
    fn test_fail_retains_prior_results() {
        let mut state = pending_state();
        state.advance(JobStage::Extracting).unwrap();
        state.profile = Some(sample_profile());
        state.advance(JobStage::Generating).unwrap();
        state.variants = sample_variants(3);

        state.fail("generation stage failed: overloaded");

        assert_eq!(state.stage, JobStage::Failed);
        assert!(state.error.as_deref().unwrap().contains("overloaded"));
        assert!(state.profile.is_some());
        assert_eq!(state.variants.len(), 3);
        assert!(state.completed_at.is_some());
        // Percent frozen at the last checkpoint, not forced to 100.
        assert_eq!(state.percent, 25);
    }

    #[test]
    fn test_terminal_state_refuses_mutation() {
        let mut state = pending_state();
        state.fail("boom");
        let error_before = state.error.clone();

        state.cancel("too late");
        state.fail("also too late");
        assert!(state.advance(JobStage::Extracting).is_err());

        assert_eq!(state.stage, JobStage::Failed);
        assert_eq!(state.error, error_before);
    }

    #[test]
    fn test_finish_sets_duration_once() {
        let mut state = pending_state();
        state.advance(JobStage::Extracting).unwrap();
        state.finish();

        let duration = state.duration_ms.unwrap();
        assert!(duration >= 0);
        assert_eq!(
            duration,
            (state.completed_at.unwrap() - state.started_at).num_milliseconds()
        );
    }

    #[test]
    fn test_snapshot_roundtrips_through_json() {
        let mut state = pending_state();
        state.advance(JobStage::Extracting).unwrap();
        state.profile = Some(sample_profile());

        let json = serde_json::to_string(&state).unwrap();
        let back: JobState = serde_json::from_str(&json).unwrap();

        assert_eq!(back.job_id, state.job_id);
        assert_eq!(back.stage, JobStage::Extracting);
        assert_eq!(
            back.profile.unwrap().brand_name,
            state.profile.unwrap().brand_name
        );
    }
}
