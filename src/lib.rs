#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

//! # nobg - Batch Background Removal
//!
//! A Rust library and CLI for removing image backgrounds with u2net-family
//! segmentation models running on ONNX Runtime. Uploads go in as raw bytes,
//! transparent PNGs come out, and batches are packaged into one flat ZIP
//! archive with deterministic, collision-free entry names.
//!
//! ## Features
//!
//! - **Single-image pipeline**: decode, segment, and apply the mask as an
//!   alpha channel in one call
//! - **Batch pipeline**: ordered sequential processing with per-item
//!   failure isolation and progress callbacks
//! - **Output formats**: PNG and WebP with transparency, JPEG composited
//!   onto a configurable background color
//! - **ZIP packaging**: one archive per batch, `no_bg_<stem>.png` entries
//!   disambiguated when inputs share a stem
//! - **CLI integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nobg::{remove_background_from_bytes, PipelineConfig};
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .model_path("models/u2net.onnx")
//!     .build()?;
//! let result = remove_background_from_bytes(&upload, config).await?;
//! let png_bytes = result.to_png_bytes()?;
//! # Ok(())
//! # }
//! ```
//!
//! Batch processing with progress reporting:
//!
//! ```rust,no_run
//! use nobg::{
//!     BackgroundRemovalPipeline, BatchProcessor, ConsoleProgressReporter,
//!     PipelineConfig, UploadedItem,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(items: Vec<UploadedItem>) -> anyhow::Result<()> {
//! let pipeline = BackgroundRemovalPipeline::new(PipelineConfig::default())?;
//! let mut batch = BatchProcessor::with_reporter(pipeline, Arc::new(ConsoleProgressReporter));
//! let outcome = batch.process_all(&items).await?;
//! if let Some(zip_bytes) = outcome.archive {
//!     std::fs::write("no_bg_images.zip", zip_bytes)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime inference backend
//! - `cli` (default): command-line interface and progress bars
//! - `webp-support` (default): WebP output format

pub mod backends;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use batch::BatchProcessor;
pub use config::{
    BackgroundColor, ModelId, OutputFormat, PipelineConfig, PipelineConfigBuilder,
    PreprocessingConfig,
};
pub use error::{BgError, Result};
pub use inference::RemovalBackend;
pub use processor::{BackendFactory, BackgroundRemovalPipeline, DefaultBackendFactory};
pub use services::{
    ArchiveBuilder, BatchProgress, ConsoleProgressReporter, NoOpProgressReporter, OutputEncoder,
    ProgressReporter, ARCHIVE_MIME,
};
pub use types::{
    ArchiveEntry, BatchOutcome, ProcessingResult, ProcessingTimings, RemovalOutput,
    SegmentationMask, UploadedItem,
};

#[cfg(feature = "cli")]
pub use tracing_config::TracingConfig;

use tokio::io::AsyncRead;

/// Remove the background from an image provided as bytes
///
/// A convenience wrapper over [`BackgroundRemovalPipeline`] for callers
/// processing one image at a time, such as web handlers.
///
/// # Errors
///
/// Returns a `Decode` error for undecodable bytes, or a `Removal` error
/// when the backend is unavailable or inference fails.
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: PipelineConfig,
) -> Result<RemovalOutput> {
    let mut pipeline = BackgroundRemovalPipeline::new(config)?;
    pipeline
        .remove(&UploadedItem::new("input", image_bytes.to_vec()))
        .await
}

/// Remove the background from an image read from an async stream
///
/// # Errors
///
/// Returns `BgError::Io` for read failures, otherwise the same errors as
/// [`remove_background_from_bytes`].
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    config: PipelineConfig,
) -> Result<RemovalOutput> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
    remove_background_from_bytes(&buffer, config).await
}
