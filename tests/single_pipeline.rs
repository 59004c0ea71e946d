//! Integration tests for the single-image pipeline

mod common;

use common::{corrupt_item, jpeg_item, mock_pipeline, png_item};
use nobg::{BackgroundColor, OutputFormat, PipelineConfig, ProcessingResult};

#[tokio::test]
async fn output_keeps_original_dimensions_and_gains_alpha() {
    let mut pipeline = mock_pipeline(PipelineConfig::default());

    let output = pipeline.remove(&png_item("photo.png", 64, 48)).await.unwrap();
    assert_eq!(output.dimensions(), (64, 48));
    assert_eq!(output.source_name, "photo.png");

    // Corners are background under the mock's circular mask
    assert_eq!(output.image.get_pixel(0, 0)[3], 0);
    assert_eq!(output.image.get_pixel(63, 47)[3], 0);
    // The center is foreground
    assert!(output.image.get_pixel(32, 24)[3] > 200);
}

#[tokio::test]
async fn jpeg_input_is_accepted() {
    let mut pipeline = mock_pipeline(PipelineConfig::default());
    let output = pipeline.remove(&jpeg_item("photo.jpg", 50, 50)).await.unwrap();
    assert_eq!(output.dimensions(), (50, 50));
}

#[tokio::test]
async fn processing_is_idempotent_byte_for_byte() {
    let item = png_item("stable.png", 40, 40);

    let mut first_pipeline = mock_pipeline(PipelineConfig::default());
    let first = first_pipeline.remove(&item).await.unwrap();

    let mut second_pipeline = mock_pipeline(PipelineConfig::default());
    let second = second_pipeline.remove(&item).await.unwrap();

    assert_eq!(
        first.to_png_bytes().unwrap(),
        second.to_png_bytes().unwrap()
    );
}

#[tokio::test]
async fn png_export_round_trips_with_transparency() {
    let mut pipeline = mock_pipeline(PipelineConfig::default());
    let output = pipeline.remove(&png_item("rt.png", 32, 32)).await.unwrap();

    let bytes = output.to_png_bytes().unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (32, 32));
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    assert!(decoded.get_pixel(16, 16)[3] > 200);
}

#[tokio::test]
async fn jpeg_export_composites_onto_background() {
    let mut pipeline = mock_pipeline(PipelineConfig::default());
    let output = pipeline.remove(&png_item("c.png", 32, 32)).await.unwrap();

    let config = PipelineConfig::default();
    let bytes = output.to_jpeg_bytes(BackgroundColor::WHITE, 95).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();

    // Transparent corners become the background color (allowing for JPEG loss)
    let corner = decoded.get_pixel(0, 0);
    assert!(corner[0] > 240 && corner[1] > 240 && corner[2] > 240);

    // The canonical RGBA output still has its transparent corner
    assert_eq!(output.image.get_pixel(0, 0)[3], 0);

    // Dispatch through to_bytes agrees with the direct call
    let via_dispatch = output.to_bytes(OutputFormat::Jpeg, &config).unwrap();
    assert_eq!(via_dispatch, bytes);
}

#[tokio::test]
async fn corrupt_input_becomes_failure_not_panic() {
    let mut pipeline = mock_pipeline(PipelineConfig::default());
    let result = pipeline.process_item(&corrupt_item("garbage.png")).await;

    match result {
        ProcessingResult::Failure { source_name, error } => {
            assert_eq!(source_name, "garbage.png");
            assert!(error.contains("garbage.png"));
        },
        ProcessingResult::Success(_) => panic!("corrupt input must fail"),
    }
}

#[tokio::test]
async fn truncated_image_becomes_failure() {
    let mut full = png_item("cut.png", 32, 32);
    full.bytes.truncate(20);

    let mut pipeline = mock_pipeline(PipelineConfig::default());
    assert!(!pipeline.process_item(&full).await.is_success());
}

#[tokio::test]
async fn items_can_be_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.png");
    std::fs::write(&path, &png_item("upload.png", 24, 24).bytes).unwrap();

    let item = nobg::UploadedItem::from_file(&path).await.unwrap();
    assert_eq!(item.name, "upload.png");

    let mut pipeline = mock_pipeline(PipelineConfig::default());
    let output = pipeline.remove(&item).await.unwrap();
    assert_eq!(output.dimensions(), (24, 24));
}

#[tokio::test]
async fn post_processing_can_be_disabled() {
    let item = png_item("raw.png", 40, 40);

    let mut smoothed = mock_pipeline(PipelineConfig::default());
    let with_post = smoothed.remove(&item).await.unwrap();

    let config = PipelineConfig::builder()
        .post_process_mask(false)
        .build()
        .unwrap();
    let mut raw = mock_pipeline(config);
    let without_post = raw.remove(&item).await.unwrap();

    // Same geometry either way; the alpha channels differ because
    // smoothing blurs the mask edge
    assert_eq!(with_post.dimensions(), without_post.dimensions());
    let differs = with_post
        .image
        .pixels()
        .zip(without_post.image.pixels())
        .any(|(a, b)| a[3] != b[3]);
    assert!(differs);
}
