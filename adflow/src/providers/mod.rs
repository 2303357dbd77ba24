//! External collaborator boundaries.
//!
//! The engine never performs extraction, generation, matching, composition
//! or scoring itself; it sequences calls across these trait seams. Every
//! trait is object-safe and async so implementations can be HTTP clients,
//! model providers or in-process mocks.

mod error;
mod types;

pub use error::{ProviderError, ProviderErrorKind};
pub use types::{
    AdAsset, BrandProfile, Claim, ComposedAd, CompositionOutcome, CompositionRequest,
    CopyVariant, GenerationRequest, ImageMatch, RiskLevel, ToneMarker, VariantScore,
};

use crate::job::JobState;
use async_trait::async_trait;
use std::sync::Arc;

/// Extracts brand signals from a landing page.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extracts a [`BrandProfile`] from the given URL.
    ///
    /// Fails with an `InvalidInput`-kinded error when no content is
    /// retrievable from the page.
    async fn extract(&self, url: &str) -> Result<BrandProfile, ProviderError>;
}

/// Generates ad copy variants from a brand profile.
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    /// Generates `request.variant_count` copy variants.
    ///
    /// Fails with a `MalformedResponse`-kinded error when the underlying
    /// model output cannot be interpreted.
    async fn generate(
        &self,
        profile: &BrandProfile,
        request: &GenerationRequest,
    ) -> Result<Vec<CopyVariant>, ProviderError>;
}

/// Matches stock imagery to a copy variant.
#[async_trait]
pub trait ImageMatcher: Send + Sync {
    /// Returns up to `images_per_variant` matches for the variant.
    ///
    /// An unmatched variant yields an empty vec; that is not an error.
    async fn match_variant(
        &self,
        variant: &CopyVariant,
        images_per_variant: u8,
    ) -> Result<Vec<ImageMatch>, ProviderError>;
}

/// Composes final ad assets from variants and their image matches.
#[async_trait]
pub trait AdComposer: Send + Sync {
    /// Renders ads for the matched variants.
    ///
    /// Per-item render failures are reported in
    /// [`CompositionOutcome::warnings`], not as stage errors.
    async fn compose(
        &self,
        variants: &[CopyVariant],
        matches: &[ImageMatch],
        request: &CompositionRequest,
    ) -> Result<CompositionOutcome, ProviderError>;
}

/// Scores a copy variant for predicted performance.
#[async_trait]
pub trait VariantScorer: Send + Sync {
    /// Scores the variant on a `[0, 100]` scale.
    async fn score(&self, variant: &CopyVariant) -> Result<VariantScore, ProviderError>;
}

/// Optional best-effort persistence side-channel.
///
/// Failures here are logged and never fail the pipeline.
#[async_trait]
pub trait CampaignSink: Send + Sync {
    /// Records campaign/variant rows for the finished run.
    ///
    /// Returns an external campaign reference on success.
    async fn record(&self, state: &JobState) -> Result<String, ProviderError>;
}

/// The collaborator bundle injected into the engine.
///
/// Cheap to clone; each field is a shared trait object.
#[derive(Clone)]
pub struct Providers {
    /// Landing-page extractor.
    pub extractor: Arc<dyn ContentExtractor>,
    /// Copy generator.
    pub generator: Arc<dyn CopyGenerator>,
    /// Stock-image matcher.
    pub matcher: Arc<dyn ImageMatcher>,
    /// Ad composer.
    pub composer: Arc<dyn AdComposer>,
    /// Variant scorer.
    pub scorer: Arc<dyn VariantScorer>,
    /// Optional campaign side-channel.
    pub campaign_sink: Option<Arc<dyn CampaignSink>>,
}

impl Providers {
    /// Bundles the five required collaborators.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        generator: Arc<dyn CopyGenerator>,
        matcher: Arc<dyn ImageMatcher>,
        composer: Arc<dyn AdComposer>,
        scorer: Arc<dyn VariantScorer>,
    ) -> Self {
        Self {
            extractor,
            generator,
            matcher,
            composer,
            scorer,
            campaign_sink: None,
        }
    }

    /// Attaches the best-effort campaign side-channel.
    #[must_use]
    pub fn with_campaign_sink(mut self, sink: Arc<dyn CampaignSink>) -> Self {
        self.campaign_sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("has_campaign_sink", &self.campaign_sink.is_some())
            .finish()
    }
}
