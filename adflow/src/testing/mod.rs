//! Testing utilities: scripted mock collaborators and fixtures.
//!
//! The mocks record call counts and can be scripted to fail, stall or
//! succeed, which is enough to exercise every retry, cancellation and
//! approval path in the engine without real providers.

use crate::config::{OutputFormat, PipelineConfig};
use crate::job::JobState;
use crate::providers::{
    AdComposer, BrandProfile, CampaignSink, Claim, ComposedAd, CompositionOutcome,
    CompositionRequest, ContentExtractor, CopyGenerator, CopyVariant, GenerationRequest,
    ImageMatch, ImageMatcher, ProviderError, Providers, RiskLevel, ToneMarker,
    VariantScore, VariantScorer,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// Initializes test logging; safe to call from multiple tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A representative brand profile fixture.
#[must_use]
pub fn sample_profile() -> BrandProfile {
    BrandProfile {
        brand_name: "Lumen Desk".to_string(),
        tagline: Some("Light where you work".to_string()),
        industry: "home office".to_string(),
        value_propositions: vec![
            "reduces eye strain".to_string(),
            "assembles in five minutes".to_string(),
        ],
        claims: vec![Claim {
            claim: "Rated 4.8 stars by 12,000 customers".to_string(),
            risk_level: RiskLevel::Low,
        }],
        tone_markers: vec![ToneMarker {
            tone: "warm".to_string(),
            confidence: 0.8,
        }],
        confidence_score: 0.9,
        website_url: "https://lumendesk.test".to_string(),
    }
}

/// Builds `count` distinct copy variants.
#[must_use]
pub fn sample_variants(count: usize) -> Vec<CopyVariant> {
    (0..count)
        .map(|n| CopyVariant {
            id: Uuid::new_v4(),
            headline: format!("Work brighter #{n}"),
            primary_text: "A desk lamp tuned to your circadian rhythm.".to_string(),
            cta: "Shop now".to_string(),
            angle: "comfort".to_string(),
            emotion: "calm".to_string(),
            persona: "remote worker".to_string(),
            quality_score: 0.75,
            claims_used: vec!["Rated 4.8 stars by 12,000 customers".to_string()],
        })
        .collect()
}

/// A valid default config pointing at a test URL.
#[must_use]
pub fn sample_config() -> PipelineConfig {
    PipelineConfig::new("https://lumendesk.test")
        .with_formats(vec![OutputFormat::Square])
        .with_output_dir("target/test-ads")
}

/// Scripted extractor: optionally fails N times (or always) before
/// returning its profile.
pub struct MockExtractor {
    profile: BrandProfile,
    failures: Mutex<VecDeque<ProviderError>>,
    fail_always: Option<ProviderError>,
    calls: AtomicUsize,
}

impl MockExtractor {
    /// Succeeds on every call with the given profile.
    #[must_use]
    pub fn new(profile: BrandProfile) -> Self {
        Self {
            profile,
            failures: Mutex::new(VecDeque::new()),
            fail_always: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call with the given error.
    #[must_use]
    pub fn failing(error: ProviderError) -> Self {
        Self {
            profile: sample_profile(),
            failures: Mutex::new(VecDeque::new()),
            fail_always: Some(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails with the scripted errors in order, then succeeds.
    #[must_use]
    pub fn with_failures(mut self, errors: Vec<ProviderError>) -> Self {
        self.failures = Mutex::new(errors.into());
        self
    }

    /// Returns the number of extraction calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentExtractor for MockExtractor {
    async fn extract(&self, _url: &str) -> Result<BrandProfile, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref err) = self.fail_always {
            return Err(err.clone());
        }
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        Ok(self.profile.clone())
    }
}

/// Scripted generator returning a fixed variant list.
pub struct MockGenerator {
    variants: Vec<CopyVariant>,
    calls: AtomicUsize,
}

impl MockGenerator {
    /// Returns the given variants on every call.
    #[must_use]
    pub fn returning(variants: Vec<CopyVariant>) -> Self {
        Self {
            variants,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of generation calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CopyGenerator for MockGenerator {
    async fn generate(
        &self,
        _profile: &BrandProfile,
        _request: &GenerationRequest,
    ) -> Result<Vec<CopyVariant>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.variants.clone())
    }
}

/// Scripted matcher returning pre-assigned matches per variant id.
///
/// Variants without an entry come back unmatched (empty vec).
#[derive(Default)]
pub struct MockMatcher {
    matches: HashMap<Uuid, Vec<ImageMatch>>,
    calls: AtomicUsize,
}

impl MockMatcher {
    /// Matches every variant in `variants` to one stock image each.
    #[must_use]
    pub fn matching(variants: &[CopyVariant]) -> Self {
        let mut matches = HashMap::new();
        for variant in variants {
            matches.insert(
                variant.id,
                vec![ImageMatch {
                    copy_variant_id: variant.id,
                    image_url: format!("https://images.test/{}.jpg", variant.id),
                    score: 0.9,
                    photographer: Some("Test Photographer".to_string()),
                    alt_text: None,
                }],
            );
        }
        Self {
            matches,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of per-variant matching calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageMatcher for MockMatcher {
    async fn match_variant(
        &self,
        variant: &CopyVariant,
        _images_per_variant: u8,
    ) -> Result<Vec<ImageMatch>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.get(&variant.id).cloned().unwrap_or_default())
    }
}

/// A matcher that signals its first call and then never returns.
///
/// Lets cancellation tests park a job mid-matching deterministically.
pub struct StallingMatcher {
    /// Notified when the first matching call arrives.
    pub started: Arc<Notify>,
    calls: AtomicUsize,
}

impl StallingMatcher {
    /// Creates the matcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of matching calls observed.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StallingMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageMatcher for StallingMatcher {
    async fn match_variant(
        &self,
        _variant: &CopyVariant,
        _images_per_variant: u8,
    ) -> Result<Vec<ImageMatch>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        futures::future::pending().await
    }
}

/// Composer pairing each matched variant with one composed ad.
#[derive(Default)]
pub struct MockComposer {
    warnings: Vec<String>,
    calls: AtomicUsize,
}

impl MockComposer {
    /// Creates a composer with no warnings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds scripted per-item warnings to every outcome.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Returns the number of composition calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdComposer for MockComposer {
    async fn compose(
        &self,
        variants: &[CopyVariant],
        matches: &[ImageMatch],
        request: &CompositionRequest,
    ) -> Result<CompositionOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ads = variants
            .iter()
            .filter(|variant| matches.iter().any(|m| m.copy_variant_id == variant.id))
            .map(|variant| ComposedAd {
                id: Uuid::new_v4(),
                copy_variant_id: variant.id,
                headline: variant.headline.clone(),
                primary_text: variant.primary_text.clone(),
                cta: variant.cta.clone(),
                assets: request
                    .formats
                    .iter()
                    .map(|format| {
                        let (width, height) = format.dimensions();
                        crate::providers::AdAsset {
                            format: *format,
                            width,
                            height,
                            url: format!(
                                "{}/{}-{format}.png",
                                request.output_dir.display(),
                                variant.id
                            ),
                        }
                    })
                    .collect(),
            })
            .collect();
        Ok(CompositionOutcome {
            ads,
            warnings: self.warnings.clone(),
        })
    }
}

/// Scorer assigning a fixed score to every variant.
#[derive(Default)]
pub struct MockScorer {
    calls: AtomicUsize,
}

impl MockScorer {
    /// Creates the scorer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of per-variant scoring calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariantScorer for MockScorer {
    async fn score(&self, variant: &CopyVariant) -> Result<VariantScore, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VariantScore {
            variant_id: variant.id,
            score: 82.0,
            confidence: 0.7,
            strengths: vec!["clear call to action".to_string()],
            weaknesses: vec![],
            recommendations: vec!["test a shorter headline".to_string()],
        })
    }
}

/// Best-effort campaign sink that records calls and can be made to fail.
#[derive(Default)]
pub struct MockCampaignSink {
    fail: bool,
    calls: AtomicUsize,
}

impl MockCampaignSink {
    /// Creates a sink that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that fails every call.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of record calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CampaignSink for MockCampaignSink {
    async fn record(&self, state: &JobState) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::server_error("campaign store unavailable"));
        }
        Ok(format!("campaign-{}", state.job_id))
    }
}

/// A happy-path provider bundle over the given variants.
///
/// Every variant is matched, composed and scored.
#[must_use]
pub fn scripted_providers(variants: Vec<CopyVariant>) -> Providers {
    Providers::new(
        Arc::new(MockExtractor::new(sample_profile())),
        Arc::new(MockGenerator::returning(variants.clone())),
        Arc::new(MockMatcher::matching(&variants)),
        Arc::new(MockComposer::new()),
        Arc::new(MockScorer::new()),
    )
}
