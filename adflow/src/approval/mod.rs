//! Human approval gate.
//!
//! After scoring, a job suspends on its approval gate until an explicit
//! decision arrives, the gate times out, or the job is cancelled. Only the
//! job's runner task blocks; progress and state queries stay responsive
//! throughout the wait and never consume the pending decision.

use crate::cancellation::CancelToken;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// An explicit approval decision.
///
/// An empty id set is a reject-all: the run still resolves to `Approved`,
/// with nothing selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// The variants the reviewer approved.
    pub variant_ids: BTreeSet<Uuid>,
}

impl ApprovalDecision {
    /// Creates a decision approving the given variants.
    #[must_use]
    pub fn approve(variant_ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            variant_ids: variant_ids.into_iter().collect(),
        }
    }

    /// Creates a reject-all decision.
    #[must_use]
    pub fn reject_all() -> Self {
        Self::default()
    }
}

/// How the gate resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// An explicit decision arrived before the timeout.
    Decided(ApprovalDecision),
    /// The timeout elapsed with no decision; the soft gate lets the run
    /// complete without sign-off.
    TimedOut,
    /// The job was cancelled while waiting.
    Cancelled,
}

/// Sender half of a job's approval channel.
///
/// The decision can be delivered exactly once; later signals are refused.
#[derive(Debug)]
pub struct ApprovalSignal {
    tx: Mutex<Option<oneshot::Sender<ApprovalDecision>>>,
}

impl ApprovalSignal {
    /// Creates the signal/receiver pair for one job.
    #[must_use]
    pub fn channel() -> (Arc<Self>, oneshot::Receiver<ApprovalDecision>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    /// Delivers the decision.
    ///
    /// Returns false if a decision was already delivered (or the gate is
    /// gone); the first decision always wins.
    pub fn resolve(&self, decision: ApprovalDecision) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Returns true if a decision has already been delivered.
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// The bounded suspension point awaiting a human decision.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalGate {
    timeout: Duration,
}

impl ApprovalGate {
    /// Creates a gate with the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Waits for a decision, the timeout, or cancellation.
    ///
    /// A dropped sender with no decision resolves like a timeout: the soft
    /// gate never wedges the run.
    pub async fn wait(
        &self,
        decision_rx: oneshot::Receiver<ApprovalDecision>,
        cancel: &CancelToken,
    ) -> ApprovalOutcome {
        tokio::select! {
            decision = decision_rx => match decision {
                Ok(decision) => ApprovalOutcome::Decided(decision),
                Err(_) => ApprovalOutcome::TimedOut,
            },
            () = tokio::time::sleep(self.timeout) => ApprovalOutcome::TimedOut,
            () = cancel.cancelled() => ApprovalOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_approval_resolves_with_ids() {
        let (signal, rx) = ApprovalSignal::channel();
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let cancel = CancelToken::new();

        let variant = Uuid::new_v4();
        assert!(signal.resolve(ApprovalDecision::approve([variant])));

        let outcome = gate.wait(rx, &cancel).await;
        match outcome {
            ApprovalOutcome::Decided(decision) => {
                assert!(decision.variant_ids.contains(&variant));
            }
            other => panic!("expected Decided, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reject_all_is_an_empty_decision() {
        let (signal, rx) = ApprovalSignal::channel();
        let gate = ApprovalGate::new(Duration::from_secs(60));
        let cancel = CancelToken::new();

        signal.resolve(ApprovalDecision::reject_all());

        match gate.wait(rx, &cancel).await {
            ApprovalOutcome::Decided(decision) => assert!(decision.variant_ids.is_empty()),
            other => panic!("expected Decided, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_soft() {
        let (_signal, rx) = ApprovalSignal::channel();
        let gate = ApprovalGate::new(Duration::from_secs(259_200));
        let cancel = CancelToken::new();

        assert_eq!(gate.wait(rx, &cancel).await, ApprovalOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let (_signal, rx) = ApprovalSignal::channel();
        let gate = ApprovalGate::new(Duration::from_secs(3600));
        let cancel = CancelToken::new();
        cancel.cancel("shutting down");

        assert_eq!(gate.wait(rx, &cancel).await, ApprovalOutcome::Cancelled);
    }

    #[test]
    fn test_signal_decides_exactly_once() {
        let (signal, _rx) = ApprovalSignal::channel();
        assert!(!signal.is_decided());

        assert!(signal.resolve(ApprovalDecision::reject_all()));
        assert!(signal.is_decided());
        assert!(!signal.resolve(ApprovalDecision::approve([Uuid::new_v4()])));
    }

    #[test]
    fn test_signal_refused_after_receiver_dropped() {
        let (signal, rx) = ApprovalSignal::channel();
        drop(rx);
        assert!(!signal.resolve(ApprovalDecision::reject_all()));
    }
}
