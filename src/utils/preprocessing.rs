//! Image preprocessing for model inference
//!
//! Converts an arbitrary decoded image into the fixed-size, normalized NCHW
//! tensor the segmentation models expect. The removal models assume a fixed
//! RGB input colorspace, so indexed/greyscale inputs are normalized here
//! before inference.

use crate::{config::PreprocessingConfig, error::Result};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image for inference
    ///
    /// Handles RGB conversion, aspect-ratio preserving resize, center padding
    /// to the model's square input size, and normalization into an NCHW
    /// tensor.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let target_size = preprocessing_config.target_size;

        // Normalize colorspace: the models assume RGB input
        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();

        let target_size_f32 = target_size as f32;
        let scale = (target_size_f32 / orig_width as f32).min(target_size_f32 / orig_height as f32);

        let new_width = ((orig_width as f32) * scale).round().max(1.0) as u32;
        let new_height = ((orig_height as f32) * scale).round().max(1.0) as u32;

        let resized = image::imageops::resize(
            &rgb_image,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        // White canvas with the resized image centered on it
        let mut canvas =
            ImageBuffer::from_pixel(target_size, target_size, image::Rgb([255, 255, 255]));
        let offset_x = (target_size - new_width.min(target_size)) / 2;
        let offset_y = (target_size - new_height.min(target_size)) / 2;

        for (x, y, pixel) in resized.enumerate_pixels() {
            let canvas_x = x + offset_x;
            let canvas_y = y + offset_y;
            if canvas_x < target_size && canvas_y < target_size {
                canvas.put_pixel(canvas_x, canvas_y, *pixel);
            }
        }

        Ok(Self::canvas_to_tensor(
            &canvas,
            preprocessing_config,
            target_size as usize,
        ))
    }

    /// Convert the padded canvas to a normalized NCHW tensor
    fn canvas_to_tensor(
        canvas: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
        target_size: usize,
    ) -> Array4<f32> {
        let mut tensor = Array4::<f32>::zeros((1, 3, target_size, target_size));

        #[allow(clippy::indexing_slicing)]
        // Tensor dimensions are pre-allocated to match the canvas size
        for (y, row) in canvas.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                for channel in 0..3 {
                    let normalized = (f32::from(pixel[channel]) / 255.0
                        - preprocessing_config.normalization_mean[channel])
                        / preprocessing_config.normalization_std[channel];
                    tensor[[0, channel, y, x]] = normalized;
                }
            }
        }

        tensor
    }
}
