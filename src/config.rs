//! Configuration types for the background removal pipeline

use crate::error::{BgError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Supported segmentation model identifiers (u2net family)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelId {
    /// General purpose model (recommended default)
    U2net,
    /// Lightweight variant, faster and less accurate
    U2netp,
    /// Human segmentation
    U2netHumanSeg,
    /// Clothing segmentation
    U2netClothSeg,
}

impl ModelId {
    /// All supported model identifiers
    pub const ALL: [ModelId; 4] = [
        Self::U2net,
        Self::U2netp,
        Self::U2netHumanSeg,
        Self::U2netClothSeg,
    ];

    /// Human-readable description for UI display
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::U2net => "General Purpose (Recommended)",
            Self::U2netp => "Lightweight",
            Self::U2netHumanSeg => "Human Segmentation",
            Self::U2netClothSeg => "Clothing Segmentation",
        }
    }

    /// Preprocessing parameters expected by this model
    ///
    /// The whole u2net family takes a 320x320 RGB input normalized with
    /// ImageNet statistics.
    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: 320,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::U2net
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U2net => write!(f, "u2net"),
            Self::U2netp => write!(f, "u2netp"),
            Self::U2netHumanSeg => write!(f, "u2net_human_seg"),
            Self::U2netClothSeg => write!(f, "u2net_cloth_seg"),
        }
    }
}

impl FromStr for ModelId {
    type Err = BgError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "u2net" => Ok(Self::U2net),
            "u2netp" => Ok(Self::U2netp),
            "u2net_human_seg" => Ok(Self::U2netHumanSeg),
            "u2net_cloth_seg" => Ok(Self::U2netClothSeg),
            other => Err(BgError::invalid_config(format!(
                "unsupported model '{other}' (supported: u2net, u2netp, u2net_human_seg, u2net_cloth_seg)"
            ))),
        }
    }
}

/// Model preprocessing parameters (input size and normalization)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square input edge length in pixels
    pub target_size: u32,
    /// Per-channel normalization mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

/// Solid RGB background color used when compositing onto formats without alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    /// Opaque white, the original default preview background
    pub const WHITE: Self = Self([255, 255, 255]);

    /// RGB components
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        self.0
    }

    /// Parse a `#RRGGBB` hex string (leading `#` optional)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BgError::invalid_config(format!(
                "invalid background color '{hex}' (expected #RRGGBB)"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        };
        Ok(Self([channel(0..2), channel(2..4), channel(4..6)]))
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for BackgroundColor {
    type Err = BgError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency (canonical output)
    Png,
    /// JPEG, composited onto a solid background color (no transparency)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl OutputFormat {
    /// File extension for this format (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// MIME type of the encoded output
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Whether the format carries an alpha channel
    #[must_use]
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

/// Configuration for pipeline runs
///
/// An explicit value object passed into every pipeline call; the pipeline
/// reads no ambient or global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Segmentation model to invoke
    pub model: ModelId,

    /// Path to the model weights file, consumed by the ONNX backend.
    /// `None` lets the backend fall back to its own discovery, which fails
    /// at initialization when no model is installed.
    pub model_path: Option<PathBuf>,

    /// Apply mask smoothing after inference (default: true)
    pub post_process_mask: bool,

    /// Background color for JPEG compositing
    pub background_color: BackgroundColor,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// WebP quality (0-100, accepted for API parity; the encoder is lossless)
    pub webp_quality: u8,

    /// Advisory batch size threshold; batches above it are warned about,
    /// never rejected
    pub max_batch_size: usize,

    /// Per-item inference timeout; expiry converts into a per-item failure
    pub item_timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Create a new configuration builder for fluent construction
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelId::default(),
            model_path: None,
            post_process_mask: true,
            background_color: BackgroundColor::WHITE,
            jpeg_quality: 95,
            webp_quality: 95,
            max_batch_size: 20,
            item_timeout: None,
        }
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: ModelId) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn post_process_mask(mut self, enabled: bool) -> Self {
        self.config.post_process_mask = enabled;
        self
    }

    #[must_use]
    pub fn background_color(mut self, color: BackgroundColor) -> Self {
        self.config.background_color = color;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality;
        self
    }

    #[must_use]
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    #[must_use]
    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.config.item_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BgError::InvalidConfig` for:
    /// - Quality values above 100
    /// - A zero `max_batch_size`
    pub fn build(self) -> Result<PipelineConfig> {
        if self.config.jpeg_quality > 100 {
            return Err(BgError::invalid_config("JPEG quality must be 0-100"));
        }
        if self.config.webp_quality > 100 {
            return Err(BgError::invalid_config("WebP quality must be 0-100"));
        }
        if self.config.max_batch_size == 0 {
            return Err(BgError::invalid_config("max_batch_size must be at least 1"));
        }
        Ok(self.config)
    }
}
