//! The per-job runner task.
//!
//! One runner drives one job through the fixed stage order. It is the
//! single writer of the job's state: every transition is published to the
//! progress tracker and persisted to the store before the next stage's
//! call is issued. Failures and cancellations fall out of the drive loop
//! as an [`Abort`] and are converted into the matching terminal state,
//! retaining whatever prior-stage results completed.

use super::EngineConfig;
use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalOutcome};
use crate::cancellation::CancelToken;
use crate::job::{JobStage, JobState, ProgressTracker};
use crate::providers::{CompositionRequest, GenerationRequest, ProviderError, Providers};
use crate::stages::{map_bounded, StageContract};
use crate::store::JobStore;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Why the drive loop stopped early.
enum Abort {
    /// A stage failed after its retries exhausted.
    Failed(String),
    /// Cancellation was observed at a suspension point.
    Cancelled(String),
}

fn stage_failed(stage: &str, err: &ProviderError) -> Abort {
    Abort::Failed(format!("{stage} stage failed: {err}"))
}

/// Executes one job to a terminal state.
pub(crate) struct JobRunner {
    pub(crate) state: Arc<RwLock<JobState>>,
    pub(crate) tracker: ProgressTracker,
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) providers: Providers,
    pub(crate) cancel: Arc<CancelToken>,
    pub(crate) config: EngineConfig,
}

impl JobRunner {
    /// Runs the job until it reaches a terminal state.
    pub(crate) async fn run(self, approval_rx: oneshot::Receiver<ApprovalDecision>) {
        let job_id = self.state.read().job_id;
        match self.drive(approval_rx).await {
            Ok(stage) => {
                info!(%job_id, %stage, "Pipeline run finished");
            }
            Err(Abort::Failed(error)) => {
                warn!(%job_id, error = %error, "Pipeline run failed");
                self.state.write().fail(error.clone());
                // Persist before publishing: a reader woken by the terminal
                // snapshot must find it durable.
                self.persist_final(job_id).await;
                self.tracker.fail(error);
            }
            Err(Abort::Cancelled(reason)) => {
                info!(%job_id, reason = %reason, "Pipeline run cancelled");
                let message = format!("Cancelled: {reason}");
                self.state.write().cancel(message.clone());
                self.persist_final(job_id).await;
                self.tracker.update(JobStage::Cancelled, message);
            }
        }
    }

    /// Drives the stage sequence, resuming at the persisted stage.
    ///
    /// A resumed stage re-runs from its contract; stages are retryable by
    /// contract, so re-invocation after a crash is safe.
    async fn drive(
        &self,
        approval_rx: oneshot::Receiver<ApprovalDecision>,
    ) -> Result<JobStage, Abort> {
        let resume_index = self.state.read().stage.sequence_index();

        if resume_index <= JobStage::Extracting.sequence_index() {
            self.extraction().await?;
        }
        if resume_index <= JobStage::Generating.sequence_index() {
            self.generation().await?;
        }
        if resume_index <= JobStage::Matching.sequence_index() {
            self.matching().await?;
        }
        if resume_index <= JobStage::Composing.sequence_index() {
            self.composition().await?;
        }
        if resume_index <= JobStage::Scoring.sequence_index() {
            self.scoring().await?;
        }
        self.approval(approval_rx).await
    }

    async fn extraction(&self) -> Result<(), Abort> {
        self.enter_stage(JobStage::Extracting, "Extracting brand profile")
            .await?;

        let contract = StageContract::new(
            "extraction",
            self.config.stage_timeout,
            self.config.standard_retry.clone(),
        );
        let url = self.state.read().config.url.clone();
        let extractor = self.providers.extractor.clone();

        let result = self
            .with_cancel(contract.run(|_| {
                let extractor = extractor.clone();
                let url = url.clone();
                async move { extractor.extract(&url).await }
            }))
            .await?;
        let profile = result.map_err(|err| stage_failed("extraction", &err))?;

        {
            let mut state = self.state.write();
            state.profile = Some(profile);
            state.message = "Brand profile extracted".to_string();
        }
        self.tracker.heartbeat("Brand profile extracted");
        self.persist().await
    }

    async fn generation(&self) -> Result<(), Abort> {
        self.enter_stage(JobStage::Generating, "Generating copy variants")
            .await?;

        let (profile, request) = {
            let state = self.state.read();
            let request = GenerationRequest {
                variant_count: state.config.variant_count,
                platform: state.config.platform,
                objective: state.config.objective,
            };
            (state.profile.clone(), request)
        };
        let Some(profile) = profile else {
            return Err(Abort::Failed(
                "generation stage failed: no extracted brand profile".to_string(),
            ));
        };

        let contract = StageContract::new(
            "generation",
            self.config.stage_timeout,
            self.config.long_call_retry.clone(),
        );
        let generator = self.providers.generator.clone();

        let result = self
            .with_cancel(contract.run(|_| {
                let generator = generator.clone();
                let profile = profile.clone();
                let request = request.clone();
                async move { generator.generate(&profile, &request).await }
            }))
            .await?;
        let variants = result.map_err(|err| stage_failed("generation", &err))?;

        {
            let mut state = self.state.write();
            state.message = format!("Generated {} copy variants", variants.len());
            state.variants = variants;
        }
        self.persist().await
    }

    async fn matching(&self) -> Result<(), Abort> {
        self.enter_stage(JobStage::Matching, "Matching stock imagery")
            .await?;

        let (variants, images_per_variant) = {
            let state = self.state.read();
            (state.variants.clone(), state.config.images_per_variant)
        };
        let total = variants.len();
        let contract = StageContract::new(
            "matching",
            self.config.stage_timeout,
            self.config.long_call_retry.clone(),
        );
        let matcher = self.providers.matcher.clone();
        let tracker = self.tracker.clone();
        let done = Arc::new(AtomicUsize::new(0));

        let fanout = map_bounded(
            variants,
            self.config.fanout_concurrency,
            move |variant| {
                let matcher = matcher.clone();
                let contract = contract.clone();
                let tracker = tracker.clone();
                let done = done.clone();
                async move {
                    let result = contract
                        .run(|_| {
                            let matcher = matcher.clone();
                            let variant = variant.clone();
                            async move {
                                matcher.match_variant(&variant, images_per_variant).await
                            }
                        })
                        .await;
                    let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                    tracker.heartbeat(format!(
                        "Matched imagery for {completed}/{total} variants"
                    ));
                    result
                }
            },
        );
        let per_variant = self.with_cancel(fanout).await?;

        // Output order follows variant order, so matches stay grouped by
        // their variant.
        let mut matches = Vec::new();
        for result in per_variant {
            matches.extend(result.map_err(|err| stage_failed("matching", &err))?);
        }

        {
            let mut state = self.state.write();
            state.message = format!("Found {} image matches", matches.len());
            state.matches = matches;
        }
        self.persist().await
    }

    async fn composition(&self) -> Result<(), Abort> {
        self.enter_stage(JobStage::Composing, "Composing ad creatives")
            .await?;

        let (variants, matches, request) = {
            let state = self.state.read();
            let request = CompositionRequest {
                output_dir: state.config.output_dir.clone(),
                formats: state.config.formats.clone(),
            };
            (state.variants.clone(), state.matches.clone(), request)
        };

        let contract = StageContract::new(
            "composition",
            self.config.stage_timeout,
            self.config.standard_retry.clone(),
        );
        let composer = self.providers.composer.clone();

        let result = self
            .with_cancel(contract.run(|_| {
                let composer = composer.clone();
                let variants = variants.clone();
                let matches = matches.clone();
                let request = request.clone();
                async move { composer.compose(&variants, &matches, &request).await }
            }))
            .await?;
        let outcome = result.map_err(|err| stage_failed("composition", &err))?;

        let job_id = self.state.read().job_id;
        for warning in &outcome.warnings {
            warn!(%job_id, warning = %warning, "Composition item warning");
        }
        {
            let mut state = self.state.write();
            state.message = format!("Composed {} ads", outcome.ads.len());
            state.warnings.extend(outcome.warnings);
            state.ads = outcome.ads;
        }
        self.persist().await
    }

    async fn scoring(&self) -> Result<(), Abort> {
        self.enter_stage(JobStage::Scoring, "Scoring copy variants")
            .await?;

        let variants = self.state.read().variants.clone();
        let total = variants.len();
        let contract = StageContract::new(
            "scoring",
            self.config.stage_timeout,
            self.config.long_call_retry.clone(),
        );
        let scorer = self.providers.scorer.clone();
        let tracker = self.tracker.clone();
        let done = Arc::new(AtomicUsize::new(0));

        let fanout = map_bounded(
            variants,
            self.config.fanout_concurrency,
            move |variant| {
                let scorer = scorer.clone();
                let contract = contract.clone();
                let tracker = tracker.clone();
                let done = done.clone();
                async move {
                    let result = contract
                        .run(|_| {
                            let scorer = scorer.clone();
                            let variant = variant.clone();
                            async move { scorer.score(&variant).await }
                        })
                        .await;
                    let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                    tracker.heartbeat(format!("Scored {completed}/{total} variants"));
                    result
                }
            },
        );
        let per_variant = self.with_cancel(fanout).await?;

        let mut scores = Vec::new();
        for result in per_variant {
            scores.push(result.map_err(|err| stage_failed("scoring", &err))?);
        }

        {
            let mut state = self.state.write();
            state.message = format!("Scored {} variants", scores.len());
            state.scores = scores;
        }
        self.persist().await
    }

    async fn approval(
        &self,
        approval_rx: oneshot::Receiver<ApprovalDecision>,
    ) -> Result<JobStage, Abort> {
        self.enter_stage(JobStage::AwaitingApproval, "Awaiting human approval")
            .await?;

        let gate = ApprovalGate::new(self.config.approval_timeout);
        let (final_stage, message) = match gate.wait(approval_rx, &self.cancel).await {
            ApprovalOutcome::Decided(decision) => {
                let message = if decision.variant_ids.is_empty() {
                    "All variants rejected".to_string()
                } else {
                    format!("{} variants approved", decision.variant_ids.len())
                };
                self.state.write().approved_variant_ids = decision.variant_ids;
                (JobStage::Approved, message)
            }
            ApprovalOutcome::TimedOut => (
                JobStage::Completed,
                "Approval window elapsed; completed without sign-off".to_string(),
            ),
            ApprovalOutcome::Cancelled => {
                return Err(Abort::Cancelled(self.cancel_reason()));
            }
        };

        // Side-channel before the terminal transition; the state stops
        // mutating once terminal.
        self.record_campaign().await;

        let job_id = {
            let mut state = self.state.write();
            state
                .advance(final_stage)
                .map_err(|err| Abort::Failed(err.to_string()))?;
            state.message = message.clone();
            // The exit timestamp is read once here; duration derives from it.
            state.finish();
            state.job_id
        };
        // Persist before publishing: a reader woken by the terminal
        // snapshot must find it durable.
        self.persist_final(job_id).await;
        self.tracker.update(final_stage, message);
        Ok(final_stage)
    }

    /// Writes campaign/variant rows through the optional side-channel.
    ///
    /// Best-effort: failures are logged and never fail the pipeline.
    async fn record_campaign(&self) {
        let Some(sink) = self.providers.campaign_sink.clone() else {
            return;
        };
        let snapshot = self.state.read().clone();
        match sink.record(&snapshot).await {
            Ok(campaign_ref) => {
                self.state.write().campaign_ref = Some(campaign_ref);
            }
            Err(err) => {
                warn!(
                    job_id = %snapshot.job_id,
                    error = %err,
                    "Campaign side-channel write failed; continuing"
                );
            }
        }
    }

    /// Transitions into a stage, publishes its checkpoint and persists.
    ///
    /// Cancellation is observed here, before the stage's call is issued.
    /// Re-entering the current stage (resume) skips the transition.
    async fn enter_stage(&self, stage: JobStage, message: &str) -> Result<(), Abort> {
        if self.cancel.is_cancelled() {
            return Err(Abort::Cancelled(self.cancel_reason()));
        }
        {
            let mut state = self.state.write();
            if state.stage != stage {
                state
                    .advance(stage)
                    .map_err(|err| Abort::Failed(err.to_string()))?;
            }
            state.message = message.to_string();
        }
        self.persist().await?;
        self.tracker.update(stage, message);
        Ok(())
    }

    /// Races a stage future against cancellation.
    async fn with_cancel<O>(&self, fut: impl Future<Output = O>) -> Result<O, Abort> {
        tokio::select! {
            output = fut => Ok(output),
            () = self.cancel.cancelled() => Err(Abort::Cancelled(self.cancel_reason())),
        }
    }

    fn cancel_reason(&self) -> String {
        self.cancel
            .reason()
            .unwrap_or_else(|| "cancelled".to_string())
    }

    /// Persists the current snapshot; on failure the run aborts, because
    /// the next stage must not be issued before this one is durable.
    async fn persist(&self) -> Result<(), Abort> {
        let snapshot = self.state.read().clone();
        self.store
            .save(&snapshot)
            .await
            .map_err(|err| Abort::Failed(format!("state persistence failed: {err}")))
    }

    /// Persists a terminal snapshot; best-effort, the run is over either way.
    async fn persist_final(&self, job_id: uuid::Uuid) {
        let snapshot = self.state.read().clone();
        if let Err(err) = self.store.save(&snapshot).await {
            warn!(%job_id, error = %err, "Failed to persist terminal job snapshot");
        }
    }
}
