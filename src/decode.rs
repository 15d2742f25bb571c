//! Image decoding and EXIF orientation normalization.
//!
//! Raw encoded bytes come in, an orientation-corrected [`RgbImage`] comes
//! out. All downstream geometry reasons about post-rotation dimensions, so
//! the rotation happens here, once, and nowhere else.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` |
//! | Orientation tag | `kamadak-exif` (`Tag::Orientation`, primary IFD) |
//! | Rotation / mirroring | `DynamicImage::rotate90` & friends |

use exif::{In, Tag};
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unrecognized or truncated image data: {0}")]
    Invalid(#[from] image::ImageError),
}

/// Landscape/portrait/square classification of decoded dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrientation {
    Landscape,
    Portrait,
    Square,
}

impl PageOrientation {
    pub fn of(width: u32, height: u32) -> Self {
        use std::cmp::Ordering::*;
        match width.cmp(&height) {
            Greater => PageOrientation::Landscape,
            Less => PageOrientation::Portrait,
            Equal => PageOrientation::Square,
        }
    }
}

impl std::fmt::Display for PageOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PageOrientation::Landscape => "landscape",
            PageOrientation::Portrait => "portrait",
            PageOrientation::Square => "square",
        };
        f.write_str(name)
    }
}

/// Decode an encoded image and apply its EXIF orientation.
///
/// The reported width/height of the returned buffer are already
/// post-rotation. A missing or unreadable orientation tag means "leave the
/// pixels alone"; a broken byte stream is a [`DecodeError`].
pub fn decode_oriented(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let orientation = exif_orientation(bytes).unwrap_or(1);
    let decoded = image::load_from_memory(bytes)?;
    Ok(apply_orientation(decoded, orientation).into_rgb8())
}

/// Read the EXIF orientation value (1..=8), if the container carries one.
fn exif_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif_data = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif_data.get_field(Tag::Orientation, In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Apply one of the eight EXIF orientations. Values outside 2..=8 (including
/// the common 1, "upright") leave the image untouched.
fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_jpeg;
    use image::{ImageEncoder, Rgb};

    #[test]
    fn decode_jpeg_reports_dimensions() {
        let bytes = make_jpeg(200, 150);
        let img = decode_oriented(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (200, 150));
    }

    #[test]
    fn decode_png_works_too() {
        let img = RgbImage::from_pixel(60, 40, Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes)
            .write_image(img.as_raw(), 60, 40, image::ExtendedColorType::Rgb8)
            .unwrap();
        let decoded = decode_oriented(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
    }

    #[test]
    fn decode_garbage_fails() {
        let result = decode_oriented(&[0x00, 0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(DecodeError::Invalid(_))));
    }

    #[test]
    fn decode_truncated_jpeg_fails() {
        let bytes = make_jpeg(100, 100);
        let result = decode_oriented(&bytes[..20]);
        assert!(result.is_err());
    }

    fn asymmetric() -> DynamicImage {
        // 2x1: red pixel left, blue pixel right.
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn orientation_1_is_identity() {
        let img = apply_orientation(asymmetric(), 1).into_rgb8();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn orientation_2_mirrors_horizontally() {
        let img = apply_orientation(asymmetric(), 2).into_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn orientation_3_rotates_half_turn() {
        let img = apply_orientation(asymmetric(), 3).into_rgb8();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        for orientation in [5, 6, 7, 8] {
            let img = apply_orientation(asymmetric(), orientation).into_rgb8();
            assert_eq!(
                (img.width(), img.height()),
                (1, 2),
                "orientation {orientation} must transpose dimensions"
            );
        }
    }

    #[test]
    fn orientation_6_rotates_clockwise() {
        // Clockwise quarter turn: left pixel ends up on top.
        let img = apply_orientation(asymmetric(), 6).into_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255]);
    }

    #[test]
    fn page_orientation_classification() {
        assert_eq!(PageOrientation::of(200, 100), PageOrientation::Landscape);
        assert_eq!(PageOrientation::of(100, 200), PageOrientation::Portrait);
        assert_eq!(PageOrientation::of(150, 150), PageOrientation::Square);
    }
}
