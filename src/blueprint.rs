//! Blueprint codec: a compact, serializable description of a layout's tree
//! shape plus its canvas size, enough to replay a rendering without
//! re-running the search.
//!
//! The wire shape is a node array:
//!
//! ```json
//! { "graph_representation": [["V", [1, 2]], ["H", []], ["V", []]],
//!   "width": 506, "height": 502 }
//! ```
//!
//! Every listed node is an internal split; node 0 is the root. The kind
//! letters name the slice axis, not the layout direction: `"V"` slices
//! with a vertical cut (children side by side, [`Orientation::Horizontal`])
//! and `"H"` with a horizontal cut (children stacked,
//! [`Orientation::Vertical`]).
//!
//! Image leaves are implicit: every node is topped up to two children,
//! listed children first, then leaves. Leaf slots bind to input images in
//! node-array order (node 0's open slots take the first images, node 1's
//! the next, and so on). A lone empty node decoded with one image is the
//! permitted degenerate case (a single-child split, identity allocation
//! in the solver).

use crate::tree::{Dimensions, Layout, Orientation, SplitNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlueprintError {
    #[error("blueprint has no nodes")]
    Empty,
    #[error("unknown node kind {0:?} (expected \"H\" or \"V\")")]
    UnknownKind(String),
    #[error("node {node} lists {count} children; at most two are allowed")]
    TooManyChildren { node: usize, count: usize },
    #[error("node {parent} references out-of-range child {child}")]
    ChildOutOfRange { parent: usize, child: usize },
    #[error("node {0} is referenced more than once (cycle or shared subtree)")]
    Revisited(usize),
    #[error("node {0} is not reachable from the root")]
    Unreachable(usize),
    #[error("blueprint requires {expected} images, got {actual}")]
    LeafCountMismatch { expected: usize, actual: usize },
}

/// Serializable tree shape + canvas, sufficient to replay a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub graph_representation: Vec<(String, Vec<usize>)>,
    pub width: u32,
    pub height: u32,
}

impl Blueprint {
    /// Reconstruct the layout this blueprint describes, binding implicit
    /// leaves to `image_count` images in node-array order.
    pub fn decode(&self, image_count: usize) -> Result<Layout, BlueprintError> {
        let nodes = &self.graph_representation;
        if nodes.is_empty() {
            return Err(BlueprintError::Empty);
        }

        let mut kinds = Vec::with_capacity(nodes.len());
        for (index, (kind, children)) in nodes.iter().enumerate() {
            kinds.push(parse_kind(kind)?);
            if children.len() > 2 {
                return Err(BlueprintError::TooManyChildren {
                    node: index,
                    count: children.len(),
                });
            }
            for &child in children {
                if child >= nodes.len() {
                    return Err(BlueprintError::ChildOutOfRange {
                        parent: index,
                        child,
                    });
                }
            }
        }

        let required = required_leaves(nodes);
        // A lone empty node with a single image is a single-leaf layout;
        // everything else must supply exactly one image per leaf slot.
        let lone_leaf = nodes.len() == 1 && nodes[0].1.is_empty() && image_count == 1;
        if !lone_leaf && image_count != required {
            return Err(BlueprintError::LeafCountMismatch {
                expected: required,
                actual: image_count,
            });
        }

        // Leaf binding is positional over the node array, independent of
        // tree depth: each node's open slots take the next image indices.
        let mut node_leaves: Vec<Vec<usize>> = Vec::with_capacity(nodes.len());
        let mut next_leaf = 0usize;
        for (_, children) in nodes {
            let open = if lone_leaf {
                1
            } else {
                2usize.saturating_sub(children.len())
            };
            node_leaves.push((next_leaf..next_leaf + open).collect());
            next_leaf += open;
        }

        let mut visited = vec![false; nodes.len()];
        let tree = build_node(0, nodes, &kinds, &node_leaves, &mut visited)?;

        if let Some(unreached) = visited.iter().position(|v| !v) {
            return Err(BlueprintError::Unreachable(unreached));
        }

        Ok(Layout {
            tree,
            canvas: Dimensions::new(self.width, self.height),
        })
    }

    /// Serialize a layout's tree shape. Internal nodes are emitted in
    /// pre-order; leaves are implicit. Splits with more than two children
    /// are nested into same-orientation pairs, which allocates identically.
    pub fn from_layout(layout: &Layout) -> Blueprint {
        let mut nodes: Vec<(Orientation, Vec<usize>)> = Vec::new();
        emit(&layout.tree, &mut nodes);
        if nodes.is_empty() {
            // A lone leaf still needs a root node to hang off.
            nodes.push((Orientation::Horizontal, Vec::new()));
        }
        Blueprint {
            graph_representation: nodes
                .into_iter()
                .map(|(orientation, children)| (kind_code(orientation).to_string(), children))
                .collect(),
            width: layout.canvas.width,
            height: layout.canvas.height,
        }
    }
}

fn parse_kind(code: &str) -> Result<Orientation, BlueprintError> {
    match code {
        "V" => Ok(Orientation::Horizontal),
        "H" => Ok(Orientation::Vertical),
        other => Err(BlueprintError::UnknownKind(other.to_string())),
    }
}

fn kind_code(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Horizontal => "V",
        Orientation::Vertical => "H",
    }
}

/// How many implicit leaves a node array calls for: each node is filled up
/// to two children.
fn required_leaves(nodes: &[(String, Vec<usize>)]) -> usize {
    nodes
        .iter()
        .map(|(_, children)| 2usize.saturating_sub(children.len()))
        .sum()
}

fn build_node(
    index: usize,
    nodes: &[(String, Vec<usize>)],
    kinds: &[Orientation],
    node_leaves: &[Vec<usize>],
    visited: &mut [bool],
) -> Result<SplitNode, BlueprintError> {
    if visited[index] {
        return Err(BlueprintError::Revisited(index));
    }
    visited[index] = true;

    let mut children = Vec::with_capacity(2);
    for &child in &nodes[index].1 {
        children.push(build_node(child, nodes, kinds, node_leaves, visited)?);
    }
    for &leaf in &node_leaves[index] {
        children.push(SplitNode::Leaf(leaf));
    }

    Ok(SplitNode::split(kinds[index], children))
}

/// Emit internal nodes in pre-order, returning nothing for a bare leaf.
/// The return value is this subtree's position in `nodes`, if internal.
fn emit(node: &SplitNode, nodes: &mut Vec<(Orientation, Vec<usize>)>) -> Option<usize> {
    let (orientation, children) = match node {
        SplitNode::Leaf(_) => return None,
        SplitNode::Split {
            orientation,
            children,
        } => (*orientation, children),
    };

    if children.len() > 2 {
        // Binarize: [c0, c1, c2, …] → [c0, same-orientation [c1, c2, …]].
        let rest = SplitNode::split(orientation, children[1..].to_vec());
        let pair = SplitNode::split(orientation, vec![children[0].clone(), rest]);
        return emit(&pair, nodes);
    }

    let position = nodes.len();
    nodes.push((orientation, Vec::new()));
    for child in children {
        if let Some(child_position) = emit(child, nodes) {
            nodes[position].1.push(child_position);
        }
    }
    Some(position)
}
