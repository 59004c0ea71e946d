//! Output format encoding
//!
//! Turns the canonical RGBA result into PNG, JPEG or WebP download bytes.
//! JPEG has no alpha channel, so JPEG output is composited onto a solid
//! background color first; the composite is always computed on a copy.

use crate::{
    config::{BackgroundColor, OutputFormat},
    error::{BgError, Result},
};
use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    ExtendedColorType, ImageEncoder, RgbImage, RgbaImage,
};
use std::io::Cursor;
use std::path::Path;

/// Encoder for the supported output formats
pub struct OutputEncoder;

impl OutputEncoder {
    /// Encode an RGBA image as PNG, preserving transparency
    ///
    /// # Errors
    ///
    /// Returns `BgError::Encode` when PNG encoding fails.
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoder = PngEncoder::new(Cursor::new(&mut bytes));
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BgError::encode_with_format("PNG", &e))?;
        Ok(bytes)
    }

    /// Encode an RGBA image as JPEG, compositing onto `background` first
    ///
    /// # Errors
    ///
    /// Returns `BgError::Encode` when JPEG encoding fails.
    pub fn encode_jpeg(
        image: &RgbaImage,
        background: BackgroundColor,
        quality: u8,
    ) -> Result<Vec<u8>> {
        let composited = Self::composite_onto(image, background);
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), quality);
        encoder
            .write_image(
                composited.as_raw(),
                composited.width(),
                composited.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| BgError::encode_with_format("JPEG", &e))?;
        Ok(bytes)
    }

    /// Encode an RGBA image as WebP, preserving transparency
    ///
    /// The `image` crate's WebP encoder is lossless; the configured WebP
    /// quality setting is accepted for interface parity but has no effect
    /// on the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns `BgError::Encode` when WebP encoding fails or WebP support
    /// is not compiled in.
    #[cfg(feature = "webp-support")]
    pub fn encode_webp(image: &RgbaImage) -> Result<Vec<u8>> {
        use image::codecs::webp::WebPEncoder;

        let mut bytes = Vec::new();
        let encoder = WebPEncoder::new_lossless(Cursor::new(&mut bytes));
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| BgError::encode_with_format("WebP", &e))?;
        Ok(bytes)
    }

    #[cfg(not(feature = "webp-support"))]
    pub fn encode_webp(_image: &RgbaImage) -> Result<Vec<u8>> {
        Err(BgError::encode(
            "WebP support not compiled in; enable the `webp-support` feature",
        ))
    }

    /// Composite an RGBA image onto a solid background color
    ///
    /// Standard source-over blending per pixel. Pure: the input image is
    /// not modified.
    #[must_use]
    pub fn composite_onto(image: &RgbaImage, background: BackgroundColor) -> RgbImage {
        let [bg_r, bg_g, bg_b] = background.rgb();
        let mut out = RgbImage::new(image.width(), image.height());
        for (src, dst) in image.pixels().zip(out.pixels_mut()) {
            let alpha = f32::from(src[3]) / 255.0;
            dst[0] = blend_channel(src[0], bg_r, alpha);
            dst[1] = blend_channel(src[1], bg_g, alpha);
            dst[2] = blend_channel(src[2], bg_b, alpha);
        }
        out
    }

    /// Derive the download filename for a single-image result
    ///
    /// PNG results keep the `no_bg_` prefix used for archive entries; the
    /// opaque formats use a `background_removed_` prefix so a user can tell
    /// composited downloads apart from transparent ones.
    #[must_use]
    pub fn output_file_name(source_name: &str, format: OutputFormat) -> String {
        let stem = file_stem(source_name);
        match format {
            OutputFormat::Png => format!("no_bg_{stem}.png"),
            OutputFormat::Jpeg | OutputFormat::WebP => {
                format!("background_removed_{stem}.{}", format.extension())
            },
        }
    }
}

fn blend_channel(src: u8, bg: u8, alpha: f32) -> u8 {
    (f32::from(src) * alpha + f32::from(bg) * (1.0 - alpha)).round() as u8
}

/// File stem of an uploaded name, falling back to `image` for names
/// without one
#[must_use]
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn half_transparent_image() -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([200, 100, 0, 128]))
    }

    #[test]
    fn test_png_round_trip_preserves_alpha() {
        let image = half_transparent_image();
        let bytes = OutputEncoder::encode_png(&image).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_jpeg_output_decodes_without_alpha() {
        let image = half_transparent_image();
        let bytes = OutputEncoder::encode_jpeg(&image, BackgroundColor::WHITE, 95).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color().channel_count(), 3);
    }

    #[test]
    fn test_composite_blends_toward_background() {
        let image = half_transparent_image();
        let composited = OutputEncoder::composite_onto(&image, BackgroundColor::WHITE);

        // alpha 128/255: roughly halfway between source and white
        let pixel = composited.get_pixel(0, 0);
        assert!(pixel[0] > 200, "red channel should move toward white");
        assert!(pixel[2] > 100, "blue channel should move toward white");
        // Input untouched
        assert_eq!(image.get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_composite_fully_transparent_is_background() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([200, 100, 0, 0]));
        let composited =
            OutputEncoder::composite_onto(&image, BackgroundColor([10, 20, 30]));
        assert_eq!(composited.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[cfg(feature = "webp-support")]
    #[test]
    fn test_webp_round_trip_preserves_alpha() {
        let image = half_transparent_image();
        let bytes = OutputEncoder::encode_webp(&image).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 128);
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            OutputEncoder::output_file_name("photo.jpg", OutputFormat::Png),
            "no_bg_photo.png"
        );
        assert_eq!(
            OutputEncoder::output_file_name("photo.png", OutputFormat::Jpeg),
            "background_removed_photo.jpg"
        );
        assert_eq!(
            OutputEncoder::output_file_name("photo.png", OutputFormat::WebP),
            "background_removed_photo.webp"
        );
    }

    #[test]
    fn test_file_stem_fallbacks() {
        assert_eq!(file_stem("a.b.png"), "a.b");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(""), "image");
        assert_eq!(file_stem(".png"), ".png");
    }
}
