//! Typed stage result structures.
//!
//! Every stage hands the next one an explicit tagged structure; nothing
//! duck-typed crosses a stage boundary. All types here are immutable once
//! produced and serialize into the persisted job snapshot.

use crate::config::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Legal/compliance risk attached to an extracted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Safe to use verbatim.
    Low,
    /// Needs qualification before use.
    Medium,
    /// Requires substantiation; avoid in generated copy.
    High,
}

/// A factual claim extracted from the landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// The claim text.
    pub claim: String,
    /// Assessed risk of repeating the claim in ad copy.
    pub risk_level: RiskLevel,
}

/// A tone dimension detected in the source content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneMarker {
    /// The tone label (e.g. "authoritative", "playful").
    pub tone: String,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Brand signals extracted from a landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandProfile {
    /// Brand or product name.
    pub brand_name: String,
    /// Tagline, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    /// Detected industry vertical.
    pub industry: String,
    /// Value propositions usable as copy angles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_propositions: Vec<String>,
    /// Extracted claims with risk levels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<Claim>,
    /// Detected tone dimensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tone_markers: Vec<ToneMarker>,
    /// Overall extraction confidence in `[0, 1]`.
    pub confidence_score: f32,
    /// The page the profile was extracted from.
    pub website_url: String,
}

/// One generated copy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyVariant {
    /// Variant identifier, referenced by matches, ads and scores.
    pub id: Uuid,
    /// Headline text.
    pub headline: String,
    /// Primary body text.
    pub primary_text: String,
    /// Call to action.
    pub cta: String,
    /// Persuasion angle the variant takes.
    pub angle: String,
    /// Emotional register of the copy.
    pub emotion: String,
    /// Audience persona the copy addresses.
    pub persona: String,
    /// Generator's own quality estimate in `[0, 1]`.
    pub quality_score: f32,
    /// Claims from the brand profile the copy relies on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims_used: Vec<String>,
}

/// A stock image matched to a copy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMatch {
    /// The variant this image was matched against.
    pub copy_variant_id: Uuid,
    /// Source URL of the image.
    pub image_url: String,
    /// Match relevance score in `[0, 1]`.
    pub score: f32,
    /// Photographer credit, when the source requires attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
    /// Alt text supplied by the image source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// A rendered asset in one output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAsset {
    /// The format the asset was rendered in.
    pub format: OutputFormat,
    /// Rendered width in pixels.
    pub width: u32,
    /// Rendered height in pixels.
    pub height: u32,
    /// Location of the rendered asset.
    pub url: String,
}

/// A fully composed ad for one copy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedAd {
    /// Ad identifier.
    pub id: Uuid,
    /// The variant the ad was composed from.
    pub copy_variant_id: Uuid,
    /// Headline as rendered.
    pub headline: String,
    /// Primary text as rendered.
    pub primary_text: String,
    /// Call to action as rendered.
    pub cta: String,
    /// Rendered assets, one per requested format.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AdAsset>,
}

/// Result of the composition stage.
///
/// Per-item render failures are collected as warnings alongside the
/// successful subset; they never fail the stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionOutcome {
    /// Successfully composed ads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ads: Vec<ComposedAd>,
    /// Human-readable warnings for items that failed to render.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Quality assessment of one copy variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantScore {
    /// The variant scored.
    pub variant_id: Uuid,
    /// Overall score in `[0, 100]`.
    pub score: f32,
    /// Scoring confidence in `[0, 1]`.
    pub confidence: f32,
    /// What works about the variant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    /// What drags the variant down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weaknesses: Vec<String>,
    /// Suggested improvements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

/// Parameters handed to the copy generator alongside the brand profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Number of variants to produce.
    pub variant_count: u8,
    /// Target platform.
    pub platform: crate::config::Platform,
    /// Campaign objective.
    pub objective: crate::config::Objective,
}

/// Parameters handed to the composer alongside variants and matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRequest {
    /// Directory rendered assets are written under.
    pub output_dir: PathBuf,
    /// Formats to render for each variant.
    pub formats: Vec<OutputFormat>,
}
