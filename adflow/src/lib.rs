//! # Adflow
//!
//! A pipeline orchestration engine for end-to-end ad creative generation runs.
//!
//! Adflow drives a fixed sequence of content-generation stages against
//! pluggable external collaborators, with support for:
//!
//! - **Stage-based execution**: extraction, generation, matching, composition
//!   and scoring run in a fixed total order with typed inputs and outputs
//! - **Durable job state**: the full job snapshot is persisted after every
//!   stage transition
//! - **Policy-governed retries**: transient provider failures retry with
//!   capped exponential backoff and jitter
//! - **Human approval gating**: runs suspend on a bounded approval gate
//!   before reaching a terminal state
//! - **Cooperative cancellation**: cancellation is observed at the next
//!   suspension point and yields a distinct terminal state
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use adflow::prelude::*;
//!
//! // Wire the engine against your collaborators and a store
//! let engine = PipelineEngine::new(providers, Arc::new(FileJobStore::new("jobs")));
//!
//! // Start a run and follow its progress
//! let job_id = engine.start(PipelineConfig::new("https://example.com")).await?;
//! let mut stream = engine.subscribe(job_id)?;
//! while let Some(snapshot) = stream.next().await {
//!     println!("{}: {}%", snapshot.stage, snapshot.percent);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod approval;
pub mod cancellation;
pub mod config;
pub mod engine;
pub mod errors;
pub mod job;
pub mod providers;
pub mod retry;
pub mod stages;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalOutcome};
    pub use crate::cancellation::CancelToken;
    pub use crate::config::{Objective, OutputFormat, PipelineConfig, Platform};
    pub use crate::engine::{EngineConfig, JobRegistry, PipelineEngine};
    pub use crate::errors::EngineError;
    pub use crate::job::{JobStage, JobState, ProgressSnapshot, ProgressStream};
    pub use crate::providers::{
        AdComposer, BrandProfile, CampaignSink, ComposedAd, CompositionOutcome,
        ContentExtractor, CopyGenerator, CopyVariant, ImageMatch, ImageMatcher,
        ProviderError, ProviderErrorKind, Providers, VariantScore, VariantScorer,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::stages::StageContract;
    pub use crate::store::{FileJobStore, JobStore, MemoryJobStore, StoreError};
}

#[cfg(test)]
mod tests {
    #[test]
    fn library_compiles() {
        assert!(true);
    }
}
