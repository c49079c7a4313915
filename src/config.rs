//! Configuration types for a conversion run.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The value is constructed once at start-up and
//! passed by reference into the client, the normalizer and the orchestrator;
//! nothing in the library reads tunables from the environment.

use crate::error::Docling2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for a batch conversion run.
///
/// # Example
/// ```rust
/// use docling2md::{ConversionConfig, ImageMode};
///
/// let config = ConversionConfig::builder()
///     .image_mode(ImageMode::EmbedFull)
///     .max_retries(3)
///     .conversion_timeout_secs(3600)
///     .build()
///     .unwrap();
/// assert_eq!(config.image_mode, ImageMode::EmbedFull);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Total attempts per job (not extra retries). Default: 3.
    pub max_retries: u32,

    /// Fixed pause between a failed attempt and the health re-probe. Default: 5000.
    pub retry_delay_ms: u64,

    /// Interval between readiness probes while waiting for start-up. Default: 3000.
    ///
    /// Fixed rather than exponential: the common case is a fast start, and a
    /// growing interval would only delay noticing it.
    pub health_interval_ms: u64,

    /// How long to wait for `/health` to answer 200 before giving up. Default: 180.
    pub health_timeout_secs: u64,

    /// Per-probe HTTP timeout for `/health`. Default: 3.
    pub health_probe_timeout_secs: u64,

    /// Per-request timeout for `/v1/convert/file`. Default: 10800 (3 h).
    ///
    /// Docling runs layout models and OCR on every page; a several-hundred
    /// page scan can legitimately take over an hour on CPU.
    pub conversion_timeout_secs: u64,

    /// Inputs larger than this are logged with a warning (never refused). Default: 500.
    pub max_file_size_mb: u64,

    /// How images are requested from the service and handled afterwards. Default: Strip.
    pub image_mode: ImageMode,

    /// Delete each job's input after its Markdown is written. Default: false.
    pub cleanup: bool,

    /// Embedded-image re-encoding settings.
    pub normalizer: NormalizerConfig,

    /// Optional progress callback for job-level events and the heartbeat.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 5000,
            health_interval_ms: 3000,
            health_timeout_secs: 180,
            health_probe_timeout_secs: 3,
            conversion_timeout_secs: 10_800,
            max_file_size_mb: 500,
            image_mode: ImageMode::default(),
            cleanup: false,
            normalizer: NormalizerConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("health_interval_ms", &self.health_interval_ms)
            .field("health_timeout_secs", &self.health_timeout_secs)
            .field("health_probe_timeout_secs", &self.health_probe_timeout_secs)
            .field("conversion_timeout_secs", &self.conversion_timeout_secs)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("image_mode", &self.image_mode)
            .field("cleanup", &self.cleanup)
            .field("normalizer", &self.normalizer)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health_probe_timeout_secs)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn health_interval_ms(mut self, ms: u64) -> Self {
        self.config.health_interval_ms = ms;
        self
    }

    pub fn health_timeout_secs(mut self, secs: u64) -> Self {
        self.config.health_timeout_secs = secs;
        self
    }

    pub fn health_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.health_probe_timeout_secs = secs.max(1);
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = secs.max(1);
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    pub fn cleanup(mut self, v: bool) -> Self {
        self.config.cleanup = v;
        self
    }

    pub fn normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.config.normalizer = normalizer;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Docling2MdError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(Docling2MdError::InvalidConfig(
                "max_retries must be ≥ 1 (it counts total attempts)".into(),
            ));
        }
        if c.health_interval_ms == 0 {
            return Err(Docling2MdError::InvalidConfig(
                "health interval must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Normalizer settings ──────────────────────────────────────────────────

/// Settings for re-encoding embedded raster images as lossy WebP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Run normalization at all. Default: true.
    pub enabled: bool,
    /// WebP quality, 0–100. Default: 65.
    pub quality: u8,
    /// libwebp effort ("method"), 0 (fast) – 6 (smallest). Default: 6.
    pub method: u8,
    /// Width bound in pixels; 0 disables it. Default: 1920.
    pub max_width: u32,
    /// Height bound in pixels; 0 disables it. Default: 1080.
    pub max_height: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quality: 65,
            method: 6,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

impl NormalizerConfig {
    /// Normalizer settings with out-of-range values clamped.
    pub fn new(enabled: bool, quality: u8, method: u8, max_width: u32, max_height: u32) -> Self {
        Self {
            enabled,
            quality: quality.min(100),
            method: method.min(6),
            max_width,
            max_height,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Policy controlling whether and how raster images survive into the Markdown.
///
/// | Mode | `image_export_mode` | `include_images` | `images_scale` | normalized |
/// |------|---------------------|------------------|----------------|------------|
/// | `Strip` | placeholder | false | 1 | no (base64 scrubbed) |
/// | `Placeholder` | placeholder | false | 1 | no |
/// | `EmbedText` | embedded | true | 1 | yes |
/// | `EmbedFull` | embedded | true | 2 | yes |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Remove all images. Best for plain-text RAG ingestion. (default)
    #[default]
    Strip,
    /// Keep an image placeholder marker where each picture was.
    Placeholder,
    /// Embed charts and diagrams as inline data.
    EmbedText,
    /// Embed every image at doubled render scale.
    EmbedFull,
}

impl ImageMode {
    /// Value of the `image_export_mode` form field.
    pub fn export_mode(self) -> &'static str {
        match self {
            ImageMode::Strip | ImageMode::Placeholder => "placeholder",
            ImageMode::EmbedText | ImageMode::EmbedFull => "embedded",
        }
    }

    /// Whether images are requested inline from the service.
    pub fn includes_images(self) -> bool {
        matches!(self, ImageMode::EmbedText | ImageMode::EmbedFull)
    }

    /// Value of the `images_scale` form field.
    pub fn images_scale(self) -> u8 {
        match self {
            ImageMode::EmbedFull => 2,
            _ => 1,
        }
    }

    /// Whether the output is run through the image normalizer.
    pub fn normalizes_images(self) -> bool {
        self.includes_images()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageMode::Strip => "strip",
            ImageMode::Placeholder => "placeholder",
            ImageMode::EmbedText => "embed_text",
            ImageMode::EmbedFull => "embed_full",
        }
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay(), Duration::from_secs(5));
        assert_eq!(c.health_interval(), Duration::from_secs(3));
        assert_eq!(c.health_timeout(), Duration::from_secs(180));
        assert_eq!(c.conversion_timeout(), Duration::from_secs(10_800));
        assert_eq!(c.image_mode, ImageMode::Strip);
        assert!(!c.cleanup);
        assert_eq!(c.normalizer, NormalizerConfig::default());
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = ConversionConfig::builder().max_retries(0).build().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn builder_rejects_zero_interval() {
        assert!(ConversionConfig::builder()
            .health_interval_ms(0)
            .build()
            .is_err());
    }

    #[test]
    fn normalizer_values_are_clamped() {
        let n = NormalizerConfig::new(true, 250, 9, 800, 600);
        assert_eq!(n.quality, 100);
        assert_eq!(n.method, 6);
        assert_eq!((n.max_width, n.max_height), (800, 600));
    }

    #[test]
    fn image_mode_directives() {
        assert_eq!(ImageMode::Strip.export_mode(), "placeholder");
        assert_eq!(ImageMode::Placeholder.export_mode(), "placeholder");
        assert_eq!(ImageMode::EmbedText.export_mode(), "embedded");
        assert_eq!(ImageMode::EmbedFull.export_mode(), "embedded");

        assert!(!ImageMode::Strip.includes_images());
        assert!(!ImageMode::Placeholder.includes_images());
        assert!(ImageMode::EmbedText.includes_images());
        assert!(ImageMode::EmbedFull.includes_images());

        assert_eq!(ImageMode::EmbedFull.images_scale(), 2);
        assert_eq!(ImageMode::EmbedText.images_scale(), 1);
        assert_eq!(ImageMode::Strip.images_scale(), 1);
    }

    #[test]
    fn image_mode_serde_is_snake_case() {
        let json = serde_json::to_string(&ImageMode::EmbedFull).unwrap();
        assert_eq!(json, "\"embed_full\"");
    }
}
