//! services/api/src/adapters/image.rs
//!
//! Implements the `ImageNormalizer` port with the `image` crate: uploads are
//! shrunk to fit the book page and re-encoded as JPEG.

use festival_stories_core::ports::{ImageNormalizer, PortError, PortResult};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;

pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;
pub const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegNormalizer;

impl ImageNormalizer for JpegNormalizer {
    fn normalize(&self, image_bytes: &[u8]) -> PortResult<Vec<u8>> {
        let img = image::load_from_memory(image_bytes)
            .map_err(|e| PortError::Unexpected(format!("Unsupported image: {}", e)))?;

        // Only ever shrink; the aspect ratio is kept.
        let (width, height) = img.dimensions();
        let img = if width > MAX_WIDTH || height > MAX_HEIGHT {
            img.thumbnail(MAX_WIDTH, MAX_HEIGHT)
        } else {
            img
        };

        let rgb = img.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode JPEG: {}", e)))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn large_images_shrink_to_fit_and_become_jpeg() {
        let jpeg = JpegNormalizer.normalize(&png(1600, 900)).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (800, 450));
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let jpeg = JpegNormalizer.normalize(&png(120, 80)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (120, 80));
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(JpegNormalizer.normalize(b"definitely not a picture").is_err());
    }
}
