//! Removal backend abstraction
//!
//! Background removal itself is an opaque external capability. Backends take
//! a preprocessed NCHW tensor and return a single-channel foreground
//! probability tensor; everything else (decoding, normalization, mask
//! application, packaging) lives in the pipeline.

use crate::{
    config::{PipelineConfig, PreprocessingConfig},
    error::Result,
};
use instant::Duration;
use ndarray::Array4;

/// Trait for background removal backends
///
/// Implementations must be `Send` so a hung inference call can be abandoned
/// on a blocking task when a per-item timeout is configured.
pub trait RemovalBackend: Send {
    /// Initialize the backend, loading model weights
    ///
    /// Returns the model load time when work was done, `None` when already
    /// initialized.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Unsupported model identifier
    /// - Runtime initialization failures
    fn initialize(&mut self, config: &PipelineConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// Input is `[1, 3, H, W]` normalized RGB; output is `[1, 1, H, W]`
    /// foreground probabilities in `0.0..=1.0`.
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures (including out-of-memory)
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Preprocessing parameters the backend's model expects
    fn preprocessing_config(&self) -> PreprocessingConfig;

    /// Check if the backend is initialized
    fn is_initialized(&self) -> bool;
}
