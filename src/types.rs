//! Core types for the batch background removal pipeline

use crate::{
    config::{BackgroundColor, OutputFormat, PipelineConfig},
    error::{BgError, Result},
    services::format::OutputEncoder,
};
use image::{ImageBuffer, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One uploaded image, immutable once received
///
/// Created by the presentation layer (CLI, web handler, test fixture) and
/// consumed by the pipelines. The bytes are the raw upload, not yet decoded.
#[derive(Debug, Clone)]
pub struct UploadedItem {
    /// Original filename as supplied by the uploader
    pub name: String,
    /// Raw image bytes (PNG, JPEG or WEBP)
    pub bytes: Vec<u8>,
}

impl UploadedItem {
    /// Create an item from a name and raw bytes
    #[must_use]
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Size of the upload in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Load an item from a file path, using the file name as the item name
    ///
    /// # Errors
    ///
    /// Returns `BgError::Io` when the file cannot be read.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input")
            .to_owned();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { name, bytes })
    }
}

/// Grayscale segmentation mask produced by a removal backend
///
/// Values are 0 (background) to 255 (foreground) at the resolution of the
/// source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255), row major
    pub data: Vec<u8>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Create a new segmentation mask
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Convert the mask to a grayscale image
    pub fn to_image(&self) -> Result<ImageBuffer<image::Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| BgError::removal("mask data does not match its dimensions"))
    }

    /// Write the mask into the alpha channel of an RGBA image
    ///
    /// # Errors
    ///
    /// Returns `BgError::Removal` when image and mask dimensions differ.
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(BgError::removal(format!(
                "image dimensions {:?} do not match mask dimensions {:?}",
                image.dimensions(),
                self.dimensions
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(self.data.iter()) {
            pixel[3] = alpha;
        }
        Ok(())
    }

    /// Smooth the mask edges and clamp near-extreme values
    ///
    /// This mirrors the post-processing step the segmentation models are
    /// usually paired with: a small blur removes stair-stepping, and values
    /// close to fully transparent or fully opaque are snapped to the extreme
    /// so flat regions stay clean.
    pub fn postprocess(&self) -> Result<SegmentationMask> {
        let image = self.to_image()?;
        let blurred = image::imageops::blur(&image, 2.0);
        let data = blurred
            .into_raw()
            .into_iter()
            .map(|v| match v {
                0..=9 => 0,
                246..=255 => 255,
                other => other,
            })
            .collect();
        Ok(Self::new(data, self.dimensions))
    }
}

/// Timing breakdown for one processed item (milliseconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding the uploaded bytes
    pub decode_ms: u64,
    /// Resize, pad and tensor conversion
    pub preprocessing_ms: u64,
    /// Backend inference
    pub inference_ms: u64,
    /// Mask mapping and alpha application
    pub postprocessing_ms: u64,
    /// End-to-end time for the item
    pub total_ms: u64,
}

/// Successful output of the single-image pipeline
///
/// Post-condition relied on by every consumer: `image` always carries an
/// alpha channel.
#[derive(Debug, Clone)]
pub struct RemovalOutput {
    /// The processed image with background pixels made transparent
    pub image: RgbaImage,
    /// Name of the uploaded item this output came from
    pub source_name: String,
    /// Timing breakdown for the item
    pub timings: ProcessingTimings,
}

impl RemovalOutput {
    /// Image dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encode as PNG, preserving the alpha channel
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        OutputEncoder::encode_png(&self.image)
    }

    /// Encode as JPEG, compositing onto the given background color first
    ///
    /// The composite is computed on a copy; the canonical RGBA result is
    /// never mutated.
    pub fn to_jpeg_bytes(&self, background: BackgroundColor, quality: u8) -> Result<Vec<u8>> {
        OutputEncoder::encode_jpeg(&self.image, background, quality)
    }

    /// Encode as WebP with alpha
    pub fn to_webp_bytes(&self) -> Result<Vec<u8>> {
        OutputEncoder::encode_webp(&self.image)
    }

    /// Encode in the given format using the quality and background settings
    /// from `config`
    pub fn to_bytes(&self, format: OutputFormat, config: &PipelineConfig) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => self.to_png_bytes(),
            OutputFormat::Jpeg => {
                self.to_jpeg_bytes(config.background_color, config.jpeg_quality)
            },
            OutputFormat::WebP => self.to_webp_bytes(),
        }
    }
}

/// Outcome of processing one uploaded item
///
/// Exactly one is produced per item; a batch run yields them in input order.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    /// The item was processed successfully
    Success(RemovalOutput),
    /// The item failed; the batch continues with the next item
    Failure {
        /// Name of the uploaded item
        source_name: String,
        /// Human-readable failure description
        error: String,
    },
}

impl ProcessingResult {
    /// Name of the item this result belongs to
    #[must_use]
    pub fn source_name(&self) -> &str {
        match self {
            Self::Success(output) => &output.source_name,
            Self::Failure { source_name, .. } => source_name,
        }
    }

    /// Whether this result is a success
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One file inside the batch archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Derived, collision-free entry filename (always `.png`)
    pub filename: String,
    /// PNG-encoded image bytes
    pub bytes: Vec<u8>,
}

/// Terminal artifact of a batch run; not mutated afterward
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Archive entries for successful items, in original input order
    pub successes: Vec<ArchiveEntry>,
    /// Names of failed items, in original input order
    pub failed_names: Vec<String>,
    /// ZIP archive of all successes. `None` means packaging was skipped
    /// because no item succeeded; an empty batch still yields a valid
    /// empty archive.
    pub archive: Option<Vec<u8>>,
}

impl BatchOutcome {
    /// Total number of items this outcome accounts for
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes.len() + self.failed_names.len()
    }

    /// Whether every item in a non-empty batch failed
    ///
    /// Callers must treat this as a distinct, reportable condition from
    /// "archive built but empty".
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.successes.is_empty() && !self.failed_names.is_empty()
    }
}
