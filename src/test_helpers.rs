//! Shared helpers for unit and integration tests.

use image::{ImageEncoder, Rgb, RgbImage};

/// Encode a small valid JPEG in memory with the given dimensions.
pub(crate) fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}
