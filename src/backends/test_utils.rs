//! Mock removal backends for testing
//!
//! Provides deterministic implementations of [`RemovalBackend`] so the
//! pipeline, batch loop and packaging can be tested without model files or
//! an ONNX runtime.

use crate::{
    config::{ModelId, PipelineConfig, PreprocessingConfig},
    error::{BgError, Result},
    inference::RemovalBackend,
    processor::BackendFactory,
};
use instant::Duration;
use ndarray::Array4;

/// Deterministic mock backend
///
/// Produces a soft circular foreground mask centered on the input, which is
/// stable across runs so idempotence can be asserted byte-for-byte.
#[derive(Debug, Clone)]
pub struct MockRemovalBackend {
    model: ModelId,
    initialized: bool,
    fail_init: bool,
    fail_inference: bool,
    inference_delay: Option<Duration>,
}

impl MockRemovalBackend {
    /// Create a new mock backend for the given model
    #[must_use]
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            initialized: false,
            fail_init: false,
            fail_inference: false,
            inference_delay: None,
        }
    }

    /// Create a mock that fails during initialization
    #[must_use]
    pub fn failing_init(model: ModelId) -> Self {
        Self {
            fail_init: true,
            ..Self::new(model)
        }
    }

    /// Create a mock that fails during inference
    #[must_use]
    pub fn failing_inference(model: ModelId) -> Self {
        Self {
            fail_inference: true,
            ..Self::new(model)
        }
    }

    /// Create a mock that sleeps before answering, for timeout tests
    #[must_use]
    pub fn with_delay(model: ModelId, delay: Duration) -> Self {
        Self {
            inference_delay: Some(delay),
            ..Self::new(model)
        }
    }

    /// Generate a soft circular mask matching the input spatial dimensions
    fn generate_mask(input: &Array4<f32>) -> Array4<f32> {
        let shape = input.shape();
        let (height, width) = (
            shape.get(2).copied().unwrap_or(0),
            shape.get(3).copied().unwrap_or(0),
        );
        let mut output = Array4::<f32>::zeros((1, 1, height, width));

        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = (width.min(height) as f32 / 3.0).max(1.0);

        for y in 0..height {
            for x in 0..width {
                let dx = x as f32 - center_x;
                let dy = y as f32 - center_y;
                let distance = (dx * dx + dy * dy).sqrt();
                let value = if distance < radius {
                    ((radius - distance) / radius).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if let Some(cell) = output.get_mut([0, 0, y, x]) {
                    *cell = value;
                }
            }
        }

        output
    }
}

impl RemovalBackend for MockRemovalBackend {
    fn initialize(&mut self, _config: &PipelineConfig) -> Result<Option<Duration>> {
        if self.fail_init {
            return Err(BgError::removal("mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgError::removal("mock backend not initialized"));
        }
        if let Some(delay) = self.inference_delay {
            std::thread::sleep(delay);
        }
        if self.fail_inference {
            return Err(BgError::removal("mock backend inference failed"));
        }
        Ok(Self::generate_mask(input))
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model.preprocessing()
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory producing clones of a template mock backend
///
/// Lets tests inject failing or slow backends into the pipeline, and gives
/// the pipeline a fresh backend after an abandoned (timed out) inference.
pub struct MockBackendFactory {
    template: MockRemovalBackend,
}

impl MockBackendFactory {
    /// Factory for well-behaved mocks
    #[must_use]
    pub fn new(model: ModelId) -> Self {
        Self {
            template: MockRemovalBackend::new(model),
        }
    }

    /// Factory cloning the given template backend
    #[must_use]
    pub fn from_template(template: MockRemovalBackend) -> Self {
        Self { template }
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(&self, _config: &PipelineConfig) -> Result<Box<dyn RemovalBackend>> {
        Ok(Box::new(self.template.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_requires_initialization() {
        let mut backend = MockRemovalBackend::new(ModelId::U2net);
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());

        backend.initialize(&PipelineConfig::default()).unwrap();
        assert!(backend.is_initialized());
        assert!(backend.infer(&input).is_ok());
    }

    #[test]
    fn test_mock_mask_is_deterministic() {
        let mut backend = MockRemovalBackend::new(ModelId::U2net);
        backend.initialize(&PipelineConfig::default()).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 16, 16));
        let first = backend.infer(&input).unwrap();
        let second = backend.infer(&input).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.shape(), &[1, 1, 16, 16]);
    }

    #[test]
    fn test_mock_mask_center_is_foreground() {
        let mut backend = MockRemovalBackend::new(ModelId::U2net);
        backend.initialize(&PipelineConfig::default()).unwrap();

        let input = Array4::<f32>::zeros((1, 3, 32, 32));
        let mask = backend.infer(&input).unwrap();
        assert!(mask[[0, 0, 16, 16]] > 0.5);
        assert!(mask[[0, 0, 0, 0]] < f32::EPSILON);
    }

    #[test]
    fn test_failing_variants() {
        let mut backend = MockRemovalBackend::failing_init(ModelId::U2netp);
        assert!(backend.initialize(&PipelineConfig::default()).is_err());

        let mut backend = MockRemovalBackend::failing_inference(ModelId::U2netp);
        backend.initialize(&PipelineConfig::default()).unwrap();
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }
}
