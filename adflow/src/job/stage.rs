//! Pipeline stage enum and transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The stage a job is currently in.
///
/// Stages advance through a fixed total order; `Failed` and `Cancelled`
/// are reachable from any non-terminal stage. Terminal stages admit no
/// further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Job accepted, nothing executed yet.
    Pending,
    /// Extracting brand signals from the landing page.
    Extracting,
    /// Generating copy variants.
    Generating,
    /// Matching stock imagery to variants.
    Matching,
    /// Composing final ad assets.
    Composing,
    /// Scoring the generated variants.
    Scoring,
    /// Waiting on the human approval gate.
    AwaitingApproval,
    /// Finished with an explicit approval decision.
    Approved,
    /// Finished without an approval decision (soft gate timeout).
    Completed,
    /// Halted on an exhausted stage failure.
    Failed,
    /// Halted on a cancellation request.
    Cancelled,
}

impl Default for JobStage {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Extracting => write!(f, "extracting"),
            Self::Generating => write!(f, "generating"),
            Self::Matching => write!(f, "matching"),
            Self::Composing => write!(f, "composing"),
            Self::Scoring => write!(f, "scoring"),
            Self::AwaitingApproval => write!(f, "awaiting_approval"),
            Self::Approved => write!(f, "approved"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStage {
    /// Returns true if no further transitions can occur.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Completed | Self::Failed | Self::Cancelled
        )
    }

    /// Pre-assigned checkpoint percent published when the stage is entered.
    ///
    /// Checkpoints are monotonic along the fixed order so concurrent
    /// progress readers never observe a decreasing value. `Failed` and
    /// `Cancelled` carry no checkpoint; they freeze the percent where the
    /// run stopped.
    #[must_use]
    pub fn checkpoint_percent(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Extracting => Some(10),
            Self::Generating => Some(25),
            Self::Matching => Some(45),
            Self::Composing => Some(65),
            Self::Scoring => Some(85),
            Self::AwaitingApproval => Some(95),
            Self::Approved | Self::Completed => Some(100),
            Self::Failed | Self::Cancelled => None,
        }
    }

    /// Position in the fixed execution order, used for resume.
    ///
    /// Terminal stages share the position past the approval gate.
    #[must_use]
    pub fn sequence_index(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Extracting => 1,
            Self::Generating => 2,
            Self::Matching => 3,
            Self::Composing => 4,
            Self::Scoring => 5,
            Self::AwaitingApproval => 6,
            Self::Approved | Self::Completed | Self::Failed | Self::Cancelled => 7,
        }
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Failed | Self::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Extracting)
                | (Self::Extracting, Self::Generating)
                | (Self::Generating, Self::Matching)
                | (Self::Matching, Self::Composing)
                | (Self::Composing, Self::Scoring)
                | (Self::Scoring, Self::AwaitingApproval)
                | (Self::AwaitingApproval, Self::Approved | Self::Completed)
        )
    }
}

/// Error raised on a transition outside the fixed total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal stage transition: {from} -> {to}")]
pub struct StageTransitionError {
    /// The stage the job was in.
    pub from: JobStage,
    /// The stage the transition targeted.
    pub to: JobStage,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: [JobStage; 7] = [
        JobStage::Pending,
        JobStage::Extracting,
        JobStage::Generating,
        JobStage::Matching,
        JobStage::Composing,
        JobStage::Scoring,
        JobStage::AwaitingApproval,
    ];

    #[test]
    fn test_fixed_order_transitions_allowed() {
        for pair in ORDER.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
        assert!(JobStage::AwaitingApproval.can_transition_to(JobStage::Approved));
        assert!(JobStage::AwaitingApproval.can_transition_to(JobStage::Completed));
    }

    #[test]
    fn test_skipping_stages_rejected() {
        assert!(!JobStage::Pending.can_transition_to(JobStage::Generating));
        assert!(!JobStage::Extracting.can_transition_to(JobStage::Scoring));
        assert!(!JobStage::Scoring.can_transition_to(JobStage::Approved));
    }

    #[test]
    fn test_backwards_transitions_rejected() {
        assert!(!JobStage::Matching.can_transition_to(JobStage::Extracting));
        assert!(!JobStage::AwaitingApproval.can_transition_to(JobStage::Pending));
    }

    #[test]
    fn test_failure_reachable_from_any_non_terminal() {
        for stage in ORDER {
            assert!(stage.can_transition_to(JobStage::Failed));
            assert!(stage.can_transition_to(JobStage::Cancelled));
        }
    }

    #[test]
    fn test_terminal_stages_admit_nothing() {
        for terminal in [
            JobStage::Approved,
            JobStage::Completed,
            JobStage::Failed,
            JobStage::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(JobStage::Failed));
            assert!(!terminal.can_transition_to(JobStage::Extracting));
        }
    }

    #[test]
    fn test_checkpoints_monotonic_along_order() {
        let mut last = 0;
        for stage in ORDER {
            let pct = stage.checkpoint_percent().unwrap();
            assert!(pct >= last, "{stage} checkpoint decreased");
            last = pct;
        }
        assert_eq!(JobStage::Approved.checkpoint_percent(), Some(100));
        assert_eq!(JobStage::Failed.checkpoint_percent(), None);
    }

    #[test]
    fn test_serialize_snake_case() {
        let json = serde_json::to_string(&JobStage::AwaitingApproval).unwrap();
        assert_eq!(json, r#""awaiting_approval""#);

        let back: JobStage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobStage::AwaitingApproval);
    }
}
