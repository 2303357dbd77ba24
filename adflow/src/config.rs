//! Pipeline run configuration.
//!
//! A [`PipelineConfig`] describes one end-to-end generation run. It is
//! validated when the job starts and immutable afterwards; every persisted
//! job snapshot embeds the config it was started with.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Advertising platform the creatives target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Meta/Facebook feed placements.
    Facebook,
    /// Instagram feed and stories.
    Instagram,
    /// LinkedIn sponsored content.
    Linkedin,
    /// TikTok in-feed video slots.
    Tiktok,
    /// Google display network.
    Google,
}

impl Default for Platform {
    fn default() -> Self {
        Self::Facebook
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Facebook => write!(f, "facebook"),
            Self::Instagram => write!(f, "instagram"),
            Self::Linkedin => write!(f, "linkedin"),
            Self::Tiktok => write!(f, "tiktok"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Campaign objective driving copy generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Broad brand awareness.
    Awareness,
    /// Click-through traffic.
    Traffic,
    /// Purchase or signup conversions.
    Conversions,
    /// Lead capture.
    Leads,
}

impl Default for Objective {
    fn default() -> Self {
        Self::Conversions
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Awareness => write!(f, "awareness"),
            Self::Traffic => write!(f, "traffic"),
            Self::Conversions => write!(f, "conversions"),
            Self::Leads => write!(f, "leads"),
        }
    }
}

/// Output asset format requested from the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 1080x1080 feed square.
    Square,
    /// 1200x628 landscape link card.
    Landscape,
    /// 1080x1350 portrait feed unit.
    Portrait,
    /// 1080x1920 full-screen story.
    Story,
}

impl OutputFormat {
    /// Returns the pixel dimensions of the format as `(width, height)`.
    #[must_use]
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1080, 1080),
            Self::Landscape => (1200, 628),
            Self::Portrait => (1080, 1350),
            Self::Story => (1080, 1920),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Square => write!(f, "square"),
            Self::Landscape => write!(f, "landscape"),
            Self::Portrait => write!(f, "portrait"),
            Self::Story => write!(f, "story"),
        }
    }
}

/// Configuration for one pipeline run.
///
/// Immutable once a job starts; use the `with_*` builders to customise
/// before calling [`PipelineEngine::start`](crate::engine::PipelineEngine::start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Landing page to extract brand signals from.
    pub url: String,
    /// Number of copy variants to generate.
    pub variant_count: u8,
    /// Target platform.
    pub platform: Platform,
    /// Campaign objective.
    pub objective: Objective,
    /// Asset formats to compose for each variant.
    pub formats: Vec<OutputFormat>,
    /// Directory composed assets are written under.
    pub output_dir: PathBuf,
    /// Candidate images fetched per variant during matching.
    pub images_per_variant: u8,
    /// Optional owning user reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<String>,
    /// Optional pre-existing campaign reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_ref: Option<String>,
}

impl PipelineConfig {
    /// Creates a config with defaults for the given landing page.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variant_count: 3,
            platform: Platform::default(),
            objective: Objective::default(),
            formats: vec![OutputFormat::Square, OutputFormat::Landscape],
            output_dir: PathBuf::from("ads"),
            images_per_variant: 3,
            user_ref: None,
            campaign_ref: None,
        }
    }

    /// Sets the number of variants to generate.
    #[must_use]
    pub fn with_variant_count(mut self, count: u8) -> Self {
        self.variant_count = count;
        self
    }

    /// Sets the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sets the campaign objective.
    #[must_use]
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Sets the output formats.
    #[must_use]
    pub fn with_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Sets the asset output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the number of candidate images fetched per variant.
    #[must_use]
    pub fn with_images_per_variant(mut self, count: u8) -> Self {
        self.images_per_variant = count;
        self
    }

    /// Sets the owning user reference.
    #[must_use]
    pub fn with_user_ref(mut self, user_ref: impl Into<String>) -> Self {
        self.user_ref = Some(user_ref.into());
        self
    }

    /// Sets an existing campaign reference.
    #[must_use]
    pub fn with_campaign_ref(mut self, campaign_ref: impl Into<String>) -> Self {
        self.campaign_ref = Some(campaign_ref.into());
        self
    }

    /// Validates the config before a job starts.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(EngineError::validation(format!(
                "url must be an http(s) URL, got '{}'",
                self.url
            )));
        }
        if self.variant_count == 0 {
            return Err(EngineError::validation("variant_count must be at least 1"));
        }
        if self.variant_count > 10 {
            return Err(EngineError::validation(format!(
                "variant_count must be at most 10, got {}",
                self.variant_count
            )));
        }
        if self.formats.is_empty() {
            return Err(EngineError::validation(
                "at least one output format is required",
            ));
        }
        if self.images_per_variant == 0 {
            return Err(EngineError::validation(
                "images_per_variant must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::new("https://example.com");
        assert!(config.validate().is_ok());
        assert_eq!(config.variant_count, 3);
        assert_eq!(config.platform, Platform::Facebook);
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = PipelineConfig::new("ftp://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_variants() {
        let config = PipelineConfig::new("https://example.com").with_variant_count(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_too_many_variants() {
        let config = PipelineConfig::new("https://example.com").with_variant_count(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_formats() {
        let config = PipelineConfig::new("https://example.com").with_formats(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = PipelineConfig::new("https://example.com")
            .with_variant_count(5)
            .with_platform(Platform::Linkedin)
            .with_objective(Objective::Leads)
            .with_user_ref("user-42");

        assert_eq!(config.variant_count, 5);
        assert_eq!(config.platform, Platform::Linkedin);
        assert_eq!(config.objective, Objective::Leads);
        assert_eq!(config.user_ref.as_deref(), Some("user-42"));
    }

    #[test]
    fn test_format_dimensions() {
        assert_eq!(OutputFormat::Square.dimensions(), (1080, 1080));
        assert_eq!(OutputFormat::Landscape.dimensions(), (1200, 628));
        assert_eq!(OutputFormat::Story.dimensions(), (1080, 1920));
    }

    #[test]
    fn test_platform_serialize() {
        let json = serde_json::to_string(&Platform::Tiktok).unwrap();
        assert_eq!(json, r#""tiktok""#);
    }
}
