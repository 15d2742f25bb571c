//! Compositor: a solved layout plus decoded pixels in, one encoded JPEG out.
//!
//! Each leaf's image is resampled (Lanczos3) to exactly fill its solved
//! rectangle and blitted onto a white canvas. The canvas is clamped to a
//! maximum pixel area *before* solving, so the integer rectangles are
//! computed for the dimensions that actually get rendered.

use crate::solver::solve;
use crate::tree::{Dimensions, Layout, TreeError};
use image::imageops::FilterType;
use image::{GenericImage, Rgb, RgbImage};
use thiserror::Error;

/// Hard cap on output pixel count; larger canvases are scaled down.
pub const MAX_CANVAS_AREA: u64 = 4096 * 4096;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("canvas has zero area")]
    EmptyCanvas,
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Scale a canvas down, preserving its aspect ratio, so its area stays
/// within [`MAX_CANVAS_AREA`]. Smaller canvases pass through untouched.
pub fn clamp_canvas(canvas: Dimensions) -> Dimensions {
    let area = canvas.area();
    if area <= MAX_CANVAS_AREA {
        return canvas;
    }
    let scale = (MAX_CANVAS_AREA as f64 / area as f64).sqrt();
    Dimensions::new(
        ((canvas.width as f64 * scale).floor() as u32).max(1),
        ((canvas.height as f64 * scale).floor() as u32).max(1),
    )
}

/// Render a layout over its images and encode the result as a JPEG.
///
/// `images` must be the decoded, orientation-corrected buffers in input
/// order; the tree's leaf indices select into this slice.
pub fn render(layout: &Layout, images: &[RgbImage]) -> Result<Vec<u8>, ComposeError> {
    if layout.canvas.width == 0 || layout.canvas.height == 0 {
        return Err(ComposeError::EmptyCanvas);
    }
    let canvas = clamp_canvas(layout.canvas);

    let dimensions: Vec<Dimensions> = images
        .iter()
        .map(|image| Dimensions::new(image.width(), image.height()))
        .collect();
    let solved = solve(&layout.tree, canvas, &dimensions)?;

    let mut output = RgbImage::from_pixel(canvas.width, canvas.height, BACKGROUND);
    for (rect, image) in solved.leaf_rects.iter().zip(images) {
        let resized = image::imageops::resize(image, rect.width, rect.height, FilterType::Lanczos3);
        output.copy_from(&resized, rect.x, rect.y)?;
    }

    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode(
        output.as_raw(),
        canvas.width,
        canvas.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(bytes)
}
