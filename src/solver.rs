//! Geometry solver: split-tree + canvas → exact pixel rectangles.
//!
//! All functions here are pure dimension math, testable without decoding a
//! single image. The solver runs two passes:
//!
//! 1. **Bottom-up**: every subtree's preferred aspect ratio is aggregated
//!    from its leaves ([`SplitNode::aspect_ratio`]).
//! 2. **Top-down**: the root receives the canvas rectangle; a `Horizontal`
//!    split partitions its width proportionally to the children's preferred
//!    aspects (shared height), a `Vertical` split partitions height
//!    proportionally to the reciprocals (shared width).
//!
//! Integer spans come from cumulative rounding, so children always tile the
//! parent exactly: no gaps, no overlap, and the root equals the canvas.

use crate::tree::{Dimensions, Orientation, SplitNode, TreeError};

/// Axis-aligned rectangle in canvas pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Every node's rectangle for one tree at one canvas size.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedLayout {
    pub canvas: Dimensions,
    /// Leaf rectangles indexed by image index.
    pub leaf_rects: Vec<Rect>,
    /// All node rectangles in pre-order (root first).
    pub node_rects: Vec<Rect>,
}

/// Compute concrete rectangles for every node of `tree` on a canvas,
/// given the intrinsic (post-orientation) dimensions of each image.
///
/// Deterministic for any tree passing [`SplitNode::validate`]. Fails with
/// [`TreeError::CanvasTooSmall`] when the canvas has too few pixels along
/// one axis to give every leaf positive area.
pub fn solve(
    tree: &SplitNode,
    canvas: Dimensions,
    images: &[Dimensions],
) -> Result<SolvedLayout, TreeError> {
    tree.validate(images.len())?;
    let aspects: Vec<f64> = images.iter().map(Dimensions::aspect).collect();

    let mut leaf_rects = vec![Rect::default(); images.len()];
    let mut node_rects = Vec::with_capacity(tree.node_count());
    let root = Rect::new(0, 0, canvas.width, canvas.height);
    allocate(tree, root, &aspects, &mut leaf_rects, &mut node_rects);

    // Sliver repair borrows pixels from siblings, which can run dry on a
    // degenerate canvas. Surface that instead of handing out empty rects.
    if leaf_rects.iter().any(|rect| rect.area() == 0) {
        return Err(TreeError::CanvasTooSmall {
            width: canvas.width,
            height: canvas.height,
        });
    }

    Ok(SolvedLayout {
        canvas,
        leaf_rects,
        node_rects,
    })
}

fn allocate(
    node: &SplitNode,
    rect: Rect,
    aspects: &[f64],
    leaf_rects: &mut [Rect],
    node_rects: &mut Vec<Rect>,
) {
    node_rects.push(rect);
    let (orientation, children) = match node {
        SplitNode::Leaf(index) => {
            leaf_rects[*index] = rect;
            return;
        }
        SplitNode::Split {
            orientation,
            children,
        } => (*orientation, children),
    };

    // A child's share of the divided axis is its preferred aspect
    // contribution: the aspect itself along a width partition, the
    // reciprocal along a height partition.
    let shares: Vec<f64> = children
        .iter()
        .map(|child| {
            let aspect = child.aspect_ratio(aspects);
            match orientation {
                Orientation::Horizontal => aspect,
                Orientation::Vertical => 1.0 / aspect,
            }
        })
        .collect();

    let total = match orientation {
        Orientation::Horizontal => rect.width,
        Orientation::Vertical => rect.height,
    };
    let spans = partition_spans(total, &shares);

    let mut offset = 0u32;
    for (child, span) in children.iter().zip(spans) {
        let child_rect = match orientation {
            Orientation::Horizontal => Rect::new(rect.x + offset, rect.y, span, rect.height),
            Orientation::Vertical => Rect::new(rect.x, rect.y + offset, rect.width, span),
        };
        allocate(child, child_rect, aspects, leaf_rects, node_rects);
        offset += span;
    }
}

/// Divide `total` pixels into integer spans proportional to `shares`.
///
/// Cumulative rounding keeps the sum exactly `total`. Zero-pixel slivers
/// (possible when a share is a tiny fraction of the whole) borrow one pixel
/// from the largest span so every child keeps positive area.
fn partition_spans(total: u32, shares: &[f64]) -> Vec<u32> {
    let share_sum: f64 = shares.iter().sum();
    if shares.len() == 1 || share_sum <= 0.0 {
        let mut spans = vec![0; shares.len()];
        if let Some(first) = spans.first_mut() {
            *first = total;
        }
        return spans;
    }

    let mut spans = Vec::with_capacity(shares.len());
    let mut cumulative = 0.0;
    let mut previous_edge = 0u32;
    for share in shares {
        cumulative += share;
        let edge = ((cumulative / share_sum) * total as f64).round() as u32;
        let edge = edge.min(total);
        spans.push(edge - previous_edge);
        previous_edge = edge;
    }
    // Rounding at the last edge lands on `total` exactly, but make the
    // invariant unconditional.
    if let Some(last) = spans.last_mut() {
        *last += total - previous_edge;
    }

    if total as usize >= shares.len() {
        repair_slivers(&mut spans);
    }
    spans
}

/// Bump any zero span to one pixel, borrowing from the current largest.
fn repair_slivers(spans: &mut [u32]) {
    for i in 0..spans.len() {
        if spans[i] == 0 {
            let donor = spans
                .iter()
                .enumerate()
                .max_by_key(|(_, span)| **span)
                .map(|(j, _)| j)
                .unwrap_or(i);
            if spans[donor] > 1 {
                spans[donor] -= 1;
                spans[i] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Orientation::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn dims(pairs: &[(u32, u32)]) -> Vec<Dimensions> {
        pairs.iter().map(|&(w, h)| Dimensions::new(w, h)).collect()
    }

    // =========================================================================
    // partition_spans
    // =========================================================================

    #[test]
    fn spans_sum_to_total() {
        let spans = partition_spans(100, &[1.0, 2.0, 3.0]);
        assert_eq!(spans.iter().sum::<u32>(), 100);
        assert_eq!(spans, vec![17, 33, 50]);
    }

    #[test]
    fn spans_handle_awkward_rounding() {
        let spans = partition_spans(10, &[1.0, 1.0, 1.0]);
        assert_eq!(spans.iter().sum::<u32>(), 10);
        for span in &spans {
            assert!(*span >= 3);
        }
    }

    #[test]
    fn spans_repair_zero_slivers() {
        let spans = partition_spans(100, &[0.001, 1.0]);
        assert_eq!(spans.iter().sum::<u32>(), 100);
        assert!(spans.iter().all(|span| *span > 0), "spans: {spans:?}");
    }

    #[test]
    fn single_share_takes_everything() {
        assert_eq!(partition_spans(42, &[7.3]), vec![42]);
    }

    // =========================================================================
    // solve
    // =========================================================================

    #[test]
    fn lone_leaf_covers_the_canvas() {
        let images = dims(&[(400, 300)]);
        let solved = solve(&SplitNode::Leaf(0), Dimensions::new(400, 300), &images).unwrap();
        assert_eq!(solved.leaf_rects[0], Rect::new(0, 0, 400, 300));
        assert_eq!(solved.node_rects, vec![Rect::new(0, 0, 400, 300)]);
    }

    #[test]
    fn single_child_split_is_identity_allocation() {
        let images = dims(&[(400, 300)]);
        let tree = SplitNode::split(Vertical, vec![SplitNode::Leaf(0)]);
        let solved = solve(&tree, Dimensions::new(200, 100), &images).unwrap();
        assert_eq!(solved.leaf_rects[0], Rect::new(0, 0, 200, 100));
    }

    #[test]
    fn horizontal_split_partitions_width_by_aspect() {
        // 2:1 and 1:1 at shared height 100 → widths 200 and 100.
        let images = dims(&[(600, 300), (250, 250)]);
        let tree = SplitNode::split(Horizontal, vec![SplitNode::Leaf(0), SplitNode::Leaf(1)]);
        let solved = solve(&tree, Dimensions::new(300, 100), &images).unwrap();
        assert_eq!(solved.leaf_rects[0], Rect::new(0, 0, 200, 100));
        assert_eq!(solved.leaf_rects[1], Rect::new(200, 0, 100, 100));
    }

    #[test]
    fn vertical_split_partitions_height_by_reciprocal_aspect() {
        // 2:1 over 1:1 at shared width 200 → heights 100 and 200.
        let images = dims(&[(600, 300), (250, 250)]);
        let tree = SplitNode::split(Vertical, vec![SplitNode::Leaf(0), SplitNode::Leaf(1)]);
        let solved = solve(&tree, Dimensions::new(200, 300), &images).unwrap();
        assert_eq!(solved.leaf_rects[0], Rect::new(0, 0, 200, 100));
        assert_eq!(solved.leaf_rects[1], Rect::new(0, 100, 200, 200));
    }

    #[test]
    fn matched_canvas_preserves_leaf_aspects() {
        // When the canvas aspect equals the aggregate aspect, every leaf
        // gets (up to rounding) its true aspect ratio.
        let images = dims(&[(400, 300), (300, 400), (500, 500)]);
        let tree = SplitNode::split(
            Horizontal,
            vec![
                SplitNode::Leaf(0),
                SplitNode::split(Vertical, vec![SplitNode::Leaf(1), SplitNode::Leaf(2)]),
            ],
        );
        let aspects: Vec<f64> = images.iter().map(Dimensions::aspect).collect();
        let aggregate = tree.aspect_ratio(&aspects);
        let height = 600u32;
        let width = (aggregate * height as f64).round() as u32;
        let solved = solve(&tree, Dimensions::new(width, height), &images).unwrap();
        for (rect, image) in solved.leaf_rects.iter().zip(&images) {
            let ratio = rect.aspect() / image.aspect();
            assert!(
                (ratio - 1.0).abs() < 0.02,
                "leaf aspect drifted: {rect:?} vs {image:?}"
            );
        }
    }

    #[test]
    fn solve_rejects_empty_split() {
        let tree = SplitNode::split(Horizontal, vec![]);
        let result = solve(&tree, Dimensions::new(100, 100), &[]);
        assert_eq!(result, Err(TreeError::EmptySplit));
    }

    #[test]
    fn solve_rejects_canvas_too_small_for_its_leaves() {
        // Three columns cannot share two pixels of width.
        let images = dims(&[(100, 100), (100, 100), (100, 100)]);
        let tree = SplitNode::split(
            Horizontal,
            vec![SplitNode::Leaf(0), SplitNode::Leaf(1), SplitNode::Leaf(2)],
        );
        let result = solve(&tree, Dimensions::new(2, 100), &images);
        assert_eq!(
            result,
            Err(TreeError::CanvasTooSmall {
                width: 2,
                height: 100
            })
        );
    }

    #[test]
    fn solve_rejects_leaf_count_mismatch() {
        let tree = SplitNode::Leaf(0);
        let images = dims(&[(100, 100), (100, 100)]);
        let result = solve(&tree, Dimensions::new(100, 100), &images);
        assert!(matches!(result, Err(TreeError::LeafCountMismatch { .. })));
    }

    // =========================================================================
    // tiling property over random trees
    // =========================================================================

    fn random_tree<R: Rng>(rng: &mut R, leaves: &[usize]) -> SplitNode {
        if leaves.len() == 1 {
            return SplitNode::Leaf(leaves[0]);
        }
        let split_at = rng.random_range(1..leaves.len());
        let orientation = if rng.random::<bool>() {
            Horizontal
        } else {
            Vertical
        };
        SplitNode::split(
            orientation,
            vec![
                random_tree(rng, &leaves[..split_at]),
                random_tree(rng, &leaves[split_at..]),
            ],
        )
    }

    #[test]
    fn random_trees_tile_the_canvas_exactly() {
        let mut rng = Pcg64::seed_from_u64(24601);
        for _ in 0..200 {
            let n = rng.random_range(1..=9usize);
            let images: Vec<Dimensions> = (0..n)
                .map(|_| {
                    Dimensions::new(rng.random_range(80..800), rng.random_range(80..800))
                })
                .collect();
            let leaves: Vec<usize> = (0..n).collect();
            let tree = random_tree(&mut rng, &leaves);
            let canvas =
                Dimensions::new(rng.random_range(200..1600), rng.random_range(200..1600));

            let solved = solve(&tree, canvas, &images).unwrap();

            let area: u64 = solved.leaf_rects.iter().map(Rect::area).sum();
            assert_eq!(area, canvas.area(), "leaves must cover the canvas");
            for rect in &solved.leaf_rects {
                assert!(rect.area() > 0, "degenerate leaf rect {rect:?}");
                assert!(rect.x + rect.width <= canvas.width);
                assert!(rect.y + rect.height <= canvas.height);
            }
            for (i, a) in solved.leaf_rects.iter().enumerate() {
                for b in &solved.leaf_rects[i + 1..] {
                    assert!(!a.overlaps(b), "overlap between {a:?} and {b:?}");
                }
            }
            assert_eq!(
                solved.node_rects[0],
                Rect::new(0, 0, canvas.width, canvas.height)
            );
        }
    }
}
