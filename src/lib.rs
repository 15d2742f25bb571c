//! # Collagist
//!
//! Automatic photo collage generation. Give it a handful of encoded images
//! and it finds an arrangement that shows every photo at close to its true
//! aspect ratio, then renders the result as a single JPEG.
//!
//! # Architecture: Search Over Split-Trees
//!
//! A collage is modeled as a *split-tree*: a binary tree whose internal
//! nodes divide a rectangle horizontally or vertically and whose leaves
//! hold images. The pipeline runs in four independent stages:
//!
//! ```text
//! 1. Decode     bytes     →  oriented RGB buffers + dimensions
//! 2. Optimize   dims      →  split-tree + canvas    (seeded genetic search)
//! 3. Solve      tree      →  exact pixel rectangles (pure integer math)
//! 4. Compose    rects     →  encoded JPEG           (resize + blit)
//! ```
//!
//! This separation exists for the same reasons any staged pipeline does:
//! the optimizer and solver are pure functions over dimensions, so the
//! layout logic is unit-testable without decoding a single image, and the
//! expensive pixel work happens exactly once, on the winning layout.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tree`] | The split-tree model: nodes, orientations, validation, aspect aggregation |
//! | [`solver`] | Tree + canvas → exact pixel rectangles (gap-free integer tiling) |
//! | [`optimizer`] | Seeded genetic search for a low-distortion arrangement |
//! | [`decode`] | Image decoding and EXIF orientation normalization |
//! | [`compose`] | Resample leaves into their rectangles, encode the canvas as JPEG |
//! | [`blueprint`] | Serializable layout description for replaying a collage without searching |
//! | [`engine`] | End-to-end orchestration: [`engine::generate_collage`] and [`engine::render_blueprint`] |
//!
//! # Design Decisions
//!
//! ## Determinism As a Contract
//!
//! All randomness flows through a single seeded PCG generator, and
//! parallel fitness evaluation is pure, so `(inputs, seed)` always
//! reproduces the same output JPEG byte for byte. That makes layouts
//! cacheable, results reproducible in bug reports, and the whole search
//! testable with plain equality assertions.
//!
//! ## The Canvas Is Part of the Answer
//!
//! Rather than fitting images into a fixed frame, each candidate tree
//! implies its own canvas: the tree's aggregate aspect ratio, clamped into
//! a sane band, at a fixed target area. Two landscape photos therefore
//! stack into a portrait canvas instead of being squeezed side by side
//! into a letterboxed strip.
//!
//! ## Exact Integer Tiling
//!
//! The solver distributes pixels by cumulative rounding, so child
//! rectangles always tile their parent exactly. No seams, no overlap, and
//! the compositor never needs edge-case padding logic.

pub mod blueprint;
pub mod compose;
pub mod decode;
pub mod engine;
pub mod optimizer;
pub mod solver;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_helpers;
