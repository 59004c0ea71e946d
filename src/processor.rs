//! Single-image background removal pipeline
//!
//! Orchestrates decode, colorspace normalization, inference, mask mapping
//! and alpha application for one uploaded item. All per-item error kinds
//! (decode, removal, encode) are caught at this boundary and converted into
//! a [`ProcessingResult::Failure`]; nothing propagates as an uncaught fault
//! to the batch loop or the presentation layer.

use crate::{
    config::PipelineConfig,
    error::{BgError, Result},
    inference::RemovalBackend,
    types::{ProcessingResult, ProcessingTimings, RemovalOutput, SegmentationMask, UploadedItem},
    utils::ImagePreprocessor,
};
use image::GenericImageView;
use instant::Instant;
use ndarray::Array4;
use tracing::{debug, info, instrument, warn};

/// Coordinate transformation parameters for tensor-to-mask conversion
#[derive(Debug, Clone)]
struct CoordinateTransformation {
    /// Scale factor used during preprocessing
    scale: f32,
    /// X offset for centering
    offset_x: u32,
    /// Y offset for centering
    offset_y: u32,
    /// Mask width in tensor coordinates
    mask_width: u32,
    /// Mask height in tensor coordinates
    mask_height: u32,
}

/// Factory trait for creating removal backends
///
/// The pipeline never constructs a concrete backend itself: frontends (and
/// tests) inject one through this trait, and the pipeline uses it again to
/// replace a backend abandoned after a timeout.
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance for the configured model
    ///
    /// # Errors
    ///
    /// Returns `BgError` when no backend is available for the configuration.
    fn create_backend(&self, config: &PipelineConfig) -> Result<Box<dyn RemovalBackend>>;
}

/// Default backend factory
///
/// Produces the ONNX backend when the `onnx` feature is enabled; otherwise
/// creating a backend fails, which frontends surface once at startup
/// instead of per item.
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    #[cfg(feature = "onnx")]
    fn create_backend(&self, config: &PipelineConfig) -> Result<Box<dyn RemovalBackend>> {
        Ok(Box::new(crate::backends::OnnxBackend::new(config.model)))
    }

    #[cfg(not(feature = "onnx"))]
    fn create_backend(&self, _config: &PipelineConfig) -> Result<Box<dyn RemovalBackend>> {
        Err(BgError::invalid_config(
            "no removal backend compiled in; enable the `onnx` feature or inject one via BackendFactory",
        ))
    }
}

/// Single-image background removal pipeline
pub struct BackgroundRemovalPipeline {
    config: PipelineConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn RemovalBackend>>,
}

impl BackgroundRemovalPipeline {
    /// Create a pipeline with the default backend factory
    ///
    /// # Errors
    ///
    /// Returns `BgError::InvalidConfig` for invalid configurations.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a pipeline with a custom backend factory
    ///
    /// # Errors
    ///
    /// Returns `BgError::InvalidConfig` for invalid configurations.
    pub fn with_factory(
        config: PipelineConfig,
        backend_factory: Box<dyn BackendFactory>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            backend_factory,
            backend: None,
        })
    }

    /// Eagerly create and initialize the backend
    ///
    /// Frontends call this once at startup so a missing removal capability
    /// (no backend, no model file) is reported once, up front, instead of
    /// being repeated per item.
    ///
    /// # Errors
    ///
    /// Returns `BgError` when the backend cannot be created or its model
    /// cannot be loaded.
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        debug!(model = %self.config.model, "initializing removal backend");
        let mut backend = self.backend_factory.create_backend(&self.config)?;
        if let Some(load_time) = backend.initialize(&self.config)? {
            info!(
                model = %self.config.model,
                load_ms = load_time.as_millis() as u64,
                "removal backend initialized"
            );
        }
        self.backend = Some(backend);
        Ok(())
    }

    /// Check if the backend is created and initialized
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend
            .as_ref()
            .is_some_and(|backend| backend.is_initialized())
    }

    /// Get the pipeline configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one uploaded item, converting every failure into a
    /// [`ProcessingResult::Failure`]
    ///
    /// This is the batch loop's entry point: it never returns an error and
    /// never panics on malformed input.
    pub async fn process_item(&mut self, item: &UploadedItem) -> ProcessingResult {
        match self.remove(item).await {
            Ok(output) => ProcessingResult::Success(output),
            Err(error) => {
                warn!(source = %item.name, error = %error, "item failed");
                ProcessingResult::Failure {
                    source_name: item.name.clone(),
                    error: error.to_string(),
                }
            },
        }
    }

    /// Remove the background from one uploaded item
    ///
    /// # Errors
    ///
    /// Returns the underlying `Decode`/`Removal` error. Prefer
    /// [`process_item`](Self::process_item) inside batch loops.
    #[instrument(
        skip(self, item),
        fields(source = %item.name, model = %self.config.model)
    )]
    pub async fn remove(&mut self, item: &UploadedItem) -> Result<RemovalOutput> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        // Decode
        let decode_start = Instant::now();
        let image = image::load_from_memory(&item.bytes)
            .map_err(|e| BgError::decode_with_source(&item.name, &e))?;
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;
        let original_dimensions = image.dimensions();

        self.initialize()?;

        // Normalize colorspace and build the input tensor
        let preprocess_start = Instant::now();
        let preprocessing_config = self
            .backend
            .as_ref()
            .ok_or_else(|| BgError::removal("backend not initialized"))?
            .preprocessing_config();
        let input_tensor =
            ImagePreprocessor::preprocess_for_inference(&image, &preprocessing_config)?;
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        // Inference (possibly bounded by the per-item timeout)
        let inference_start = Instant::now();
        let output_tensor = self.run_inference(input_tensor).await?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        // Map the tensor back to a full-resolution mask and apply it
        let postprocess_start = Instant::now();
        let mask = Self::tensor_to_mask(&output_tensor, original_dimensions)?;
        let mask = if self.config.post_process_mask {
            mask.postprocess()?
        } else {
            mask
        };

        let mut rgba = image.to_rgba8();
        mask.apply_to_image(&mut rgba)?;
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        debug!(
            source = %item.name,
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "background removed"
        );

        Ok(RemovalOutput {
            image: rgba,
            source_name: item.name.clone(),
            timings,
        })
    }

    /// Run inference, applying the configured per-item timeout
    ///
    /// A timed-out inference call cannot be interrupted; the backend is
    /// handed to a blocking task and abandoned there on expiry. The next
    /// item gets a fresh backend from the factory.
    async fn run_inference(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let mut backend = self
            .backend
            .take()
            .ok_or_else(|| BgError::removal("backend not initialized"))?;

        match self.config.item_timeout {
            None => {
                let output = backend.infer(&input);
                self.backend = Some(backend);
                output
            },
            Some(limit) => {
                let task = tokio::task::spawn_blocking(move || {
                    let output = backend.infer(&input);
                    (backend, output)
                });
                match tokio::time::timeout(limit, task).await {
                    Ok(Ok((backend, output))) => {
                        self.backend = Some(backend);
                        output
                    },
                    Ok(Err(join_error)) => Err(BgError::removal(format!(
                        "inference task failed: {join_error}"
                    ))),
                    Err(_) => {
                        warn!(
                            timeout_s = limit.as_secs_f64(),
                            "inference timed out; backend will be re-created"
                        );
                        Err(BgError::removal(format!(
                            "background removal timed out after {:.1}s",
                            limit.as_secs_f64()
                        )))
                    },
                }
            },
        }
    }

    /// Convert the output tensor to a mask at the original resolution
    ///
    /// Inverts the aspect-preserving resize and center padding applied
    /// during preprocessing.
    fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        Self::validate_tensor_shape(tensor)?;
        let transformation = Self::calculate_inverse_transformation(tensor, original_dimensions);

        let (orig_width, orig_height) = original_dimensions;
        let mut mask_data = Vec::with_capacity((orig_width as usize) * (orig_height as usize));
        for y in 0..orig_height {
            for x in 0..orig_width {
                let value = Self::tensor_value_at(tensor, x, y, &transformation);
                mask_data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        Ok(SegmentationMask::new(mask_data, original_dimensions))
    }

    fn validate_tensor_shape(tensor: &Array4<f32>) -> Result<()> {
        let shape = tensor.shape();
        if shape.first().copied().unwrap_or(0) != 1 || shape.get(1).copied().unwrap_or(0) != 1 {
            return Err(BgError::removal(format!(
                "unexpected output tensor shape {shape:?}, expected [1, 1, H, W]"
            )));
        }
        Ok(())
    }

    fn calculate_inverse_transformation(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> CoordinateTransformation {
        let shape = tensor.shape();
        let mask_height = shape.get(2).copied().unwrap_or(0) as u32;
        let mask_width = shape.get(3).copied().unwrap_or(0) as u32;
        let (orig_width, orig_height) = original_dimensions;

        // Mirror the preprocessing math to recover scale and centering
        let target_size = mask_width as f32;
        let scale = (target_size / orig_width as f32).min(target_size / orig_height as f32);

        let scaled_width = ((orig_width as f32) * scale).round().max(1.0) as u32;
        let scaled_height = ((orig_height as f32) * scale).round().max(1.0) as u32;

        let offset_x = (mask_width - scaled_width.min(mask_width)) / 2;
        let offset_y = (mask_height - scaled_height.min(mask_height)) / 2;

        CoordinateTransformation {
            scale,
            offset_x,
            offset_y,
            mask_width,
            mask_height,
        }
    }

    fn tensor_value_at(
        tensor: &Array4<f32>,
        x: u32,
        y: u32,
        transformation: &CoordinateTransformation,
    ) -> f32 {
        let scaled_x = ((x as f32) * transformation.scale).round() as u32;
        let scaled_y = ((y as f32) * transformation.scale).round() as u32;

        let tensor_x = scaled_x + transformation.offset_x;
        let tensor_y = scaled_y + transformation.offset_y;

        if tensor_x < transformation.mask_width && tensor_y < transformation.mask_height {
            tensor
                .get([0, 0, tensor_y as usize, tensor_x as usize])
                .copied()
                .unwrap_or(0.0)
        } else {
            // Outside the model's prediction area
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackendFactory;
    use crate::config::ModelId;

    fn test_pipeline() -> BackgroundRemovalPipeline {
        BackgroundRemovalPipeline::with_factory(
            PipelineConfig::default(),
            Box::new(MockBackendFactory::new(ModelId::U2net)),
        )
        .unwrap()
    }

    fn png_item(name: &str, width: u32, height: u32) -> UploadedItem {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([90, 120, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        UploadedItem::new(name, bytes)
    }

    #[tokio::test]
    async fn test_output_is_rgba_at_original_size() {
        let mut pipeline = test_pipeline();
        let output = pipeline.remove(&png_item("in.png", 40, 30)).await.unwrap();
        assert_eq!(output.dimensions(), (40, 30));
        assert_eq!(output.source_name, "in.png");
        // Mock mask: transparent corners, opaque-ish center
        assert_eq!(output.image.get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_corrupt_bytes_become_failure() {
        let mut pipeline = test_pipeline();
        let item = UploadedItem::new("broken.png", b"definitely not an image".to_vec());
        let result = pipeline.process_item(&item).await;
        match result {
            ProcessingResult::Failure { source_name, error } => {
                assert_eq!(source_name, "broken.png");
                assert!(error.contains("decode"));
            },
            ProcessingResult::Success(_) => panic!("corrupt bytes must not succeed"),
        }
    }

    #[tokio::test]
    async fn test_inference_failure_becomes_failure() {
        let mut pipeline = BackgroundRemovalPipeline::with_factory(
            PipelineConfig::default(),
            Box::new(MockBackendFactory::from_template(
                crate::backends::MockRemovalBackend::failing_inference(ModelId::U2net),
            )),
        )
        .unwrap();

        let result = pipeline.process_item(&png_item("a.png", 8, 8)).await;
        assert!(!result.is_success());
    }

    #[test]
    fn test_default_factory_without_backend_is_fatal() {
        // With no backend feature compiled in, creating a backend is the
        // startup-time fatal condition
        #[cfg(not(feature = "onnx"))]
        {
            let factory = DefaultBackendFactory;
            assert!(factory.create_backend(&PipelineConfig::default()).is_err());
        }
    }

    #[test]
    fn test_tensor_to_mask_square_identity() {
        // 4x4 tensor onto a 4x4 image: no scaling, no offsets
        let mut tensor = Array4::<f32>::zeros((1, 1, 4, 4));
        tensor[[0, 0, 0, 0]] = 1.0;
        tensor[[0, 0, 3, 3]] = 0.5;

        let mask = BackgroundRemovalPipeline::tensor_to_mask(&tensor, (4, 4)).unwrap();
        assert_eq!(mask.dimensions, (4, 4));
        assert_eq!(mask.data.first().copied(), Some(255));
        assert_eq!(mask.data.last().copied(), Some(127));
    }

    #[test]
    fn test_tensor_to_mask_rejects_bad_shape() {
        let tensor = Array4::<f32>::zeros((1, 3, 4, 4));
        assert!(BackgroundRemovalPipeline::tensor_to_mask(&tensor, (4, 4)).is_err());
    }
}
