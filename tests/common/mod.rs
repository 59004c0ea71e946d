//! Shared fixtures for integration tests
#![allow(dead_code)]

use nobg::backends::MockBackendFactory;
use nobg::{
    BackgroundRemovalPipeline, BatchProgress, ModelId, PipelineConfig, ProgressReporter,
    UploadedItem,
};
use std::io::Cursor;
use std::sync::Mutex;

/// Pipeline wired to the deterministic mock backend
pub fn mock_pipeline(config: PipelineConfig) -> BackgroundRemovalPipeline {
    BackgroundRemovalPipeline::with_factory(config, Box::new(MockBackendFactory::new(ModelId::U2net)))
        .expect("pipeline construction")
}

/// A small solid-color PNG upload
pub fn png_item(name: &str, width: u32, height: u32) -> UploadedItem {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("png fixture");
    UploadedItem::new(name, bytes)
}

/// A small solid-color JPEG upload
pub fn jpeg_item(name: &str, width: u32, height: u32) -> UploadedItem {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([30, 140, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("jpeg fixture");
    UploadedItem::new(name, bytes)
}

/// An upload that cannot be decoded as an image
pub fn corrupt_item(name: &str) -> UploadedItem {
    UploadedItem::new(name, b"this is not image data at all".to_vec())
}

/// Reporter that records every update for ordering assertions
#[derive(Default)]
pub struct RecordingReporter {
    pub updates: Mutex<Vec<(usize, usize, String)>>,
    pub failures: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn item_done(&self, progress: &BatchProgress) {
        self.updates.lock().unwrap().push((
            progress.completed,
            progress.total,
            progress.current_name.clone(),
        ));
    }

    fn item_failed(&self, progress: &BatchProgress, _error: &str) {
        self.failures
            .lock()
            .unwrap()
            .push(progress.current_name.clone());
    }
}
