//! ONNX Runtime backend for u2net-family segmentation models
//!
//! Loads a `.onnx` model file from the configured path and runs inference
//! through ONNX Runtime. If the model file is missing this fails once, at
//! initialization; it is the caller's startup-time fatal condition, not a
//! per-item failure.

use crate::{
    config::{ModelId, PipelineConfig, PreprocessingConfig},
    error::{BgError, Result},
    inference::RemovalBackend,
};
use instant::Duration;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::PathBuf;
use tracing::{debug, info};

/// ONNX Runtime backend
pub struct OnnxBackend {
    model: ModelId,
    session: Option<Session>,
    initialized: bool,
}

impl OnnxBackend {
    /// Create a new, uninitialized backend for the given model
    #[must_use]
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            session: None,
            initialized: false,
        }
    }

    /// Resolve the model file path from the configuration
    ///
    /// A configured path pointing at a directory is extended with the
    /// conventional `<model>.onnx` file name.
    fn resolve_model_file(&self, config: &PipelineConfig) -> Result<PathBuf> {
        let base = config.model_path.clone().ok_or_else(|| {
            BgError::invalid_config(format!(
                "no model path configured for '{}'; the removal capability is unavailable",
                self.model
            ))
        })?;

        let path = if base.is_dir() {
            base.join(format!("{}.onnx", self.model))
        } else {
            base
        };

        if !path.is_file() {
            return Err(BgError::removal(format!(
                "model file '{}' for '{}' not found",
                path.display(),
                self.model
            )));
        }
        Ok(path)
    }

    fn load_model(&mut self, config: &PipelineConfig) -> Result<Duration> {
        let load_start = instant::Instant::now();
        let model_file = self.resolve_model_file(config)?;

        debug!(model = %self.model, path = %model_file.display(), "loading ONNX model");

        let session = Session::builder()
            .map_err(|e| BgError::removal(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgError::removal(format!("failed to set optimization level: {e}")))?
            .commit_from_file(&model_file)
            .map_err(|e| {
                BgError::removal(format!(
                    "failed to load model '{}': {e}",
                    model_file.display()
                ))
            })?;

        self.session = Some(session);
        self.initialized = true;

        let load_time = load_start.elapsed();
        info!(
            model = %self.model,
            load_ms = load_time.as_millis() as u64,
            "ONNX model loaded"
        );
        Ok(load_time)
    }
}

impl RemovalBackend for OnnxBackend {
    fn initialize(&mut self, config: &PipelineConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        Ok(Some(self.load_model(config)?))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgError::removal("ONNX session not initialized"))?;

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgError::removal(format!("failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgError::removal(format!("ONNX inference failed: {e}")))?;

        // Positional output access: the u2net exports name their outputs
        // inconsistently across conversions
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgError::removal("model produced no output tensors"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgError::removal("first output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgError::removal(format!("failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape().to_vec();
        if output_shape.len() != 4 {
            return Err(BgError::removal(format!(
                "expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        }

        let data = output_tensor.view().to_owned();
        Array4::from_shape_vec(
            (
                output_shape.first().copied().unwrap_or(1),
                output_shape.get(1).copied().unwrap_or(1),
                output_shape.get(2).copied().unwrap_or(1),
                output_shape.get(3).copied().unwrap_or(1),
            ),
            data.into_raw_vec_and_offset().0,
        )
        .map_err(|e| BgError::removal(format!("failed to reshape output tensor: {e}")))
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.preprocessing()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
