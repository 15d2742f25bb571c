//! End-to-end pipeline: encoded image bytes in, finished collage out.
//!
//! Two entry points. [`generate_collage`] runs the full search (decode,
//! optimize, render); [`render_blueprint`] replays a previously saved
//! [`Blueprint`] against a new set of inputs without searching.

use crate::blueprint::{Blueprint, BlueprintError};
use crate::compose::{render, ComposeError};
use crate::decode::{decode_oriented, DecodeError};
use crate::optimizer::optimize;
use crate::tree::{Dimensions, Layout, TreeError};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("at least one input image is required")]
    NoImages,
    #[error("input image {index}: {source}")]
    Decode { index: usize, source: DecodeError },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Blueprint(#[from] BlueprintError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// A finished collage: the encoded JPEG plus the layout that produced it.
#[derive(Debug, Clone)]
pub struct Collage {
    pub jpeg: Vec<u8>,
    pub layout: Layout,
}

impl Collage {
    /// The replayable description of this collage's arrangement.
    pub fn blueprint(&self) -> Blueprint {
        Blueprint::from_layout(&self.layout)
    }
}

/// Decode the inputs, search for a layout, and render it.
///
/// Deterministic: the same input bytes and seed always produce the same
/// JPEG, byte for byte.
pub fn generate_collage<B: AsRef<[u8]>>(
    inputs: &[B],
    seed: Option<u64>,
) -> Result<Collage, EngineError> {
    let images = decode_all(inputs)?;
    let dimensions: Vec<Dimensions> = images
        .iter()
        .map(|image| Dimensions::new(image.width(), image.height()))
        .collect();
    let layout = optimize(&dimensions, seed)?;
    let jpeg = render(&layout, &images)?;
    Ok(Collage { jpeg, layout })
}

/// Replay a saved blueprint against the given inputs, skipping the search.
///
/// The blueprint's leaf slots bind to the inputs positionally, so the
/// image count must match exactly.
pub fn render_blueprint<B: AsRef<[u8]>>(
    blueprint: &Blueprint,
    inputs: &[B],
) -> Result<Collage, EngineError> {
    let images = decode_all(inputs)?;
    let layout = blueprint.decode(images.len())?;
    let jpeg = render(&layout, &images)?;
    Ok(Collage { jpeg, layout })
}

fn decode_all<B: AsRef<[u8]>>(inputs: &[B]) -> Result<Vec<RgbImage>, EngineError> {
    if inputs.is_empty() {
        return Err(EngineError::NoImages);
    }
    inputs
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            decode_oriented(bytes.as_ref()).map_err(|source| EngineError::Decode { index, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_jpeg;

    #[test]
    fn no_inputs_is_an_error() {
        let inputs: Vec<Vec<u8>> = Vec::new();
        assert!(matches!(
            generate_collage(&inputs, None),
            Err(EngineError::NoImages)
        ));
    }

    #[test]
    fn decode_failure_names_the_offending_input() {
        let inputs = vec![make_jpeg(100, 80), vec![0xde, 0xad, 0xbe, 0xef]];
        match generate_collage(&inputs, None) {
            Err(EngineError::Decode { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn single_input_renders_at_its_own_aspect() {
        let inputs = vec![make_jpeg(300, 200)];
        let collage = generate_collage(&inputs, None).unwrap();
        let decoded = image::load_from_memory(&collage.jpeg).unwrap();
        let aspect = decoded.width() as f64 / decoded.height() as f64;
        assert!((aspect - 1.5).abs() < 0.01);
    }
}
