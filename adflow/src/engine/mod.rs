//! The pipeline engine: job lifecycle and control surface.
//!
//! A [`PipelineEngine`] owns its collaborators, its store and an explicit
//! job registry. Each started job runs as an independent task; the engine
//! exposes non-blocking progress/state queries, approval and cancellation
//! signals, a subscription stream, and explicit resume from a persisted
//! checkpoint.

mod registry;
mod runner;


pub use registry::{JobHandle, JobRegistry};

use crate::approval::ApprovalDecision;
use crate::cancellation::CancelToken;
use crate::config::PipelineConfig;
use crate::errors::EngineError;
use crate::job::{JobState, ProgressSnapshot, ProgressStream, ProgressTracker};
use crate::providers::Providers;
use crate::retry::RetryPolicy;
use crate::store::{JobStore, StoreError};
use parking_lot::RwLock;
use runner::JobRunner;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the approval gate waits before resolving soft.
    pub approval_timeout: Duration,
    /// Per-attempt timeout applied to every stage call.
    pub stage_timeout: Duration,
    /// Worker-pool cap for per-variant fan-out stages.
    pub fanout_concurrency: usize,
    /// Retry policy for ordinary collaborator calls.
    pub standard_retry: RetryPolicy,
    /// Retry policy for rate-limited, latency-variable calls.
    pub long_call_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Multi-day soft gate: reviewers get three days before the
            // run completes without sign-off.
            approval_timeout: Duration::from_secs(3 * 24 * 60 * 60),
            stage_timeout: Duration::from_secs(120),
            fanout_concurrency: 4,
            standard_retry: RetryPolicy::standard(),
            long_call_retry: RetryPolicy::long_running_external_call(),
        }
    }
}

impl EngineConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the approval gate timeout.
    #[must_use]
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Sets the per-attempt stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the fan-out worker-pool cap.
    #[must_use]
    pub fn with_fanout_concurrency(mut self, concurrency: usize) -> Self {
        self.fanout_concurrency = concurrency;
        self
    }

    /// Sets the standard retry policy.
    #[must_use]
    pub fn with_standard_retry(mut self, policy: RetryPolicy) -> Self {
        self.standard_retry = policy;
        self
    }

    /// Sets the long-running-call retry policy.
    #[must_use]
    pub fn with_long_call_retry(mut self, policy: RetryPolicy) -> Self {
        self.long_call_retry = policy;
        self
    }
}

/// Orchestrates ad-generation pipeline runs.
pub struct PipelineEngine {
    providers: Providers,
    store: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    config: EngineConfig,
}

impl PipelineEngine {
    /// Creates an engine over the given collaborators and store.
    #[must_use]
    pub fn new(providers: Providers, store: Arc<dyn JobStore>) -> Self {
        Self {
            providers,
            store,
            registry: Arc::new(JobRegistry::new()),
            config: EngineConfig::default(),
        }
    }

    /// Replaces the engine config.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the engine's job registry.
    #[must_use]
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Validates the config, persists the pending snapshot and starts the
    /// run as an independent task.
    ///
    /// Returns the fresh job id immediately; follow the run through
    /// [`query_progress`](Self::query_progress) or
    /// [`subscribe`](Self::subscribe).
    pub async fn start(&self, config: PipelineConfig) -> Result<Uuid, EngineError> {
        config.validate()?;
        let job_id = Uuid::new_v4();
        let state = JobState::new(job_id, config);
        self.store.save(&state).await?;
        self.launch(state);
        tracing::info!(%job_id, "Pipeline job started");
        Ok(job_id)
    }

    /// Re-enters the state machine of a persisted, non-terminal job.
    ///
    /// The run continues at the persisted stage with its persisted
    /// predecessor outputs; nothing restarts from pending.
    pub async fn resume(&self, job_id: Uuid) -> Result<(), EngineError> {
        if let Some(handle) = self.registry.get(job_id) {
            if handle.state.read().is_terminal() {
                return Err(EngineError::validation(
                    "job already reached a terminal stage",
                ));
            }
            return Err(EngineError::validation("job is already running"));
        }
        let state = match self.store.load(job_id).await {
            Ok(state) => state,
            Err(StoreError::NotFound(_)) => return Err(EngineError::JobNotFound(job_id)),
            Err(err) => return Err(err.into()),
        };
        if state.is_terminal() {
            return Err(EngineError::validation(
                "job already reached a terminal stage",
            ));
        }
        let stage = state.stage;
        self.launch(state);
        tracing::info!(%job_id, %stage, "Pipeline job resumed from persisted checkpoint");
        Ok(())
    }

    fn launch(&self, state: JobState) {
        let job_id = state.job_id;
        let tracker = ProgressTracker::new(ProgressSnapshot::initial(
            state.stage,
            state.percent,
            state.message.clone(),
        ));
        let (approval, approval_rx) = crate::approval::ApprovalSignal::channel();
        let cancel = Arc::new(CancelToken::new());
        let shared = Arc::new(RwLock::new(state));

        self.registry.insert(
            job_id,
            JobHandle {
                state: shared.clone(),
                tracker: tracker.clone(),
                approval,
                cancel: cancel.clone(),
            },
        );

        let runner = JobRunner {
            state: shared,
            tracker,
            store: self.store.clone(),
            providers: self.providers.clone(),
            cancel,
            config: self.config.clone(),
        };
        tokio::spawn(runner.run(approval_rx));
    }

    /// Returns the latest progress snapshot without blocking.
    ///
    /// Works for running and finished jobs alike; querying never resumes
    /// or perturbs the pipeline.
    pub fn query_progress(&self, job_id: Uuid) -> Result<ProgressSnapshot, EngineError> {
        self.registry
            .get(job_id)
            .map(|handle| handle.tracker.snapshot())
            .ok_or(EngineError::JobNotFound(job_id))
    }

    /// Returns the current full job state without blocking.
    ///
    /// Falls back to the store for jobs this engine instance is not
    /// running (e.g. after a restart).
    pub async fn query_state(&self, job_id: Uuid) -> Result<JobState, EngineError> {
        if let Some(handle) = self.registry.get(job_id) {
            return Ok(handle.state_snapshot());
        }
        match self.store.load(job_id).await {
            Ok(state) => Ok(state),
            Err(StoreError::NotFound(_)) => Err(EngineError::JobNotFound(job_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Waits until the job reaches a terminal stage and returns its state.
    ///
    /// Callers needing non-blocking access should use
    /// [`query_state`](Self::query_state) instead.
    pub async fn query_result(&self, job_id: Uuid) -> Result<JobState, EngineError> {
        let Some(handle) = self.registry.get(job_id) else {
            let state = self.query_state(job_id).await?;
            if state.is_terminal() {
                return Ok(state);
            }
            return Err(EngineError::validation(
                "job is not running in this engine; resume it to continue",
            ));
        };

        let mut progress = handle.tracker.watch();
        loop {
            if progress.borrow_and_update().is_terminal() {
                break;
            }
            if progress.changed().await.is_err() {
                break;
            }
        }
        Ok(handle.state_snapshot())
    }

    /// Delivers an explicit approval for the given variants.
    ///
    /// Returns false if a decision was already delivered.
    pub fn signal_approve(
        &self,
        job_id: Uuid,
        variant_ids: Vec<Uuid>,
    ) -> Result<bool, EngineError> {
        let handle = self
            .registry
            .get(job_id)
            .ok_or(EngineError::JobNotFound(job_id))?;
        Ok(handle.approval.resolve(ApprovalDecision::approve(variant_ids)))
    }

    /// Delivers a reject-all decision.
    ///
    /// Returns false if a decision was already delivered.
    pub fn signal_reject_all(&self, job_id: Uuid) -> Result<bool, EngineError> {
        let handle = self
            .registry
            .get(job_id)
            .ok_or(EngineError::JobNotFound(job_id))?;
        Ok(handle.approval.resolve(ApprovalDecision::reject_all()))
    }

    /// Requests cooperative cancellation of the job.
    pub fn cancel(&self, job_id: Uuid) -> Result<(), EngineError> {
        self.cancel_with_reason(job_id, "cancelled by caller")
    }

    /// Requests cooperative cancellation with an explicit reason.
    pub fn cancel_with_reason(
        &self,
        job_id: Uuid,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        let handle = self
            .registry
            .get(job_id)
            .ok_or(EngineError::JobNotFound(job_id))?;
        handle.cancel.cancel(reason);
        Ok(())
    }

    /// Opens a progress subscription that ends after the terminal snapshot.
    pub fn subscribe(&self, job_id: Uuid) -> Result<ProgressStream, EngineError> {
        self.registry
            .get(job_id)
            .map(|handle| handle.subscribe())
            .ok_or(EngineError::JobNotFound(job_id))
    }

    /// Lists the most recently modified jobs from the store.
    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<JobState>, EngineError> {
        Ok(self.store.list(limit).await?)
    }
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("registered_jobs", &self.registry.len())
            .finish()
    }
}
