//! The split-tree layout model.
//!
//! A collage arrangement is a tree of horizontal/vertical divisions
//! terminating in image leaves. [`SplitNode`] is a sum type so every
//! consumer (solver, compositor, blueprint codec) matches exhaustively on
//! the two node kinds; there is no third state to defend against.
//!
//! Every image index `0..N` must appear as exactly one leaf.
//! [`SplitNode::validate`] checks that bijection; the optimizer maintains
//! it by construction and the blueprint codec re-checks it on decode.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("split node has no children")]
    EmptySplit,
    #[error("leaf references image {index} but only {count} images exist")]
    LeafOutOfRange { index: usize, count: usize },
    #[error("image {0} appears as more than one leaf")]
    DuplicateLeaf(usize),
    #[error("tree has {actual} leaves but {expected} images were supplied")]
    LeafCountMismatch { expected: usize, actual: usize },
    #[error("at least one image is required")]
    NoImages,
    #[error("canvas {width}x{height} is too small to give every image visible area")]
    CanvasTooSmall { width: u32, height: u32 },
}

/// Which way a split divides its rectangle.
///
/// `Horizontal` lays children out left-to-right (they share the parent's
/// height and partition its width); `Vertical` stacks them top-to-bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Intrinsic or canvas pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// One node of a layout tree: either an image leaf or a split with one or
/// more ordered children.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitNode {
    /// Exactly one input image, identified by its position in the input
    /// sequence.
    Leaf(usize),
    Split {
        orientation: Orientation,
        children: Vec<SplitNode>,
    },
}

/// A solved arrangement: a tree plus the canvas it is meant to fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub tree: SplitNode,
    pub canvas: Dimensions,
}

impl SplitNode {
    pub fn split(orientation: Orientation, children: Vec<SplitNode>) -> Self {
        SplitNode::Split {
            orientation,
            children,
        }
    }

    /// Total node count, internal nodes included.
    pub fn node_count(&self) -> usize {
        match self {
            SplitNode::Leaf(_) => 1,
            SplitNode::Split { children, .. } => {
                1 + children.iter().map(SplitNode::node_count).sum::<usize>()
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            SplitNode::Leaf(_) => 1,
            SplitNode::Split { children, .. } => {
                children.iter().map(SplitNode::leaf_count).sum()
            }
        }
    }

    /// Image indices in left-to-right in-order traversal order.
    pub fn leaf_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.leaf_count());
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<usize>) {
        match self {
            SplitNode::Leaf(index) => out.push(*index),
            SplitNode::Split { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Check the structural contract: no empty splits, and the leaves form
    /// a bijection with image indices `0..image_count`.
    pub fn validate(&self, image_count: usize) -> Result<(), TreeError> {
        self.check_splits()?;
        let mut seen = vec![false; image_count];
        for index in self.leaf_indices() {
            if index >= image_count {
                return Err(TreeError::LeafOutOfRange {
                    index,
                    count: image_count,
                });
            }
            if seen[index] {
                return Err(TreeError::DuplicateLeaf(index));
            }
            seen[index] = true;
        }
        let actual = self.leaf_count();
        if actual != image_count {
            return Err(TreeError::LeafCountMismatch {
                expected: image_count,
                actual,
            });
        }
        Ok(())
    }

    fn check_splits(&self) -> Result<(), TreeError> {
        match self {
            SplitNode::Leaf(_) => Ok(()),
            SplitNode::Split { children, .. } => {
                if children.is_empty() {
                    return Err(TreeError::EmptySplit);
                }
                for child in children {
                    child.check_splits()?;
                }
                Ok(())
            }
        }
    }

    /// The aspect ratio this subtree prefers when every leaf keeps its true
    /// aspect ratio.
    ///
    /// Side-by-side children add their aspects; stacked children combine
    /// harmonically. A single-child split passes its child's aspect through.
    pub fn aspect_ratio(&self, aspects: &[f64]) -> f64 {
        match self {
            SplitNode::Leaf(index) => aspects[*index],
            SplitNode::Split {
                orientation: Orientation::Horizontal,
                children,
            } => children.iter().map(|c| c.aspect_ratio(aspects)).sum(),
            SplitNode::Split {
                orientation: Orientation::Vertical,
                children,
            } => {
                let reciprocal: f64 = children
                    .iter()
                    .map(|c| 1.0 / c.aspect_ratio(aspects))
                    .sum();
                1.0 / reciprocal
            }
        }
    }
}
