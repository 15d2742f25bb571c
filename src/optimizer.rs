//! Layout optimizer: seeded genetic search over split-trees.
//!
//! A genome is a binary split-tree over the input images. Each candidate is
//! scored by solving it on a canvas derived from its own aggregate aspect
//! ratio: the canvas aspect is clamped into a sane band at a fixed target
//! area, so arrangements that imply an extreme shape (a single strip of
//! many images) get a canvas they cannot fill without distorting every
//! leaf, and that distortion is the fitness signal. It is also what flips the
//! canvas orientation for same-orientation inputs: two landscape photos
//! stack into a portrait canvas rather than squeeze into a clamped row.
//!
//! All randomness flows through one seeded `Pcg64` threaded explicitly
//! through the search, so a `(images, seed)` pair always reproduces the
//! same layout bit for bit. Fitness evaluation is pure and runs across the
//! population with rayon; parallelism cannot change the result.
//!
//! Candidates are kept in the blueprint codec's normal form (internal
//! children before leaf children, leaves numbered the way the codec binds
//! them on replay). After a subtree graft this renumbering is also what
//! repairs the leaf bijection: duplicated or missing indices are
//! rewritten in binding order.

use crate::solver::solve;
use crate::tree::{Dimensions, Layout, Orientation, SplitNode, TreeError};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;

/// Canvas area every candidate is solved at (~1.5 megapixels).
pub const TARGET_CANVAS_AREA: f64 = 1_500_000.0;
/// Canvas aspect band; aggregates outside it are clamped.
pub const MIN_CANVAS_ASPECT: f64 = 0.5;
pub const MAX_CANVAS_ASPECT: f64 = 2.0;

const POPULATION_SIZE: usize = 64;
const GENERATION_LIMIT: usize = 250;
const PATIENCE: usize = 30;
const TOURNAMENT_SIZE: usize = 3;
const ELITE_COUNT: usize = 8;
const MUTATION_RATE: f64 = 0.35;
/// Tie-break: of two equally undistorted layouts, prefer the simpler tree.
const NODE_COUNT_WEIGHT: f64 = 1e-4;
const DEFAULT_SEED: u64 = 0;

struct Candidate {
    tree: SplitNode,
    score: f64,
}

/// Find a good arrangement for the given intrinsic image dimensions.
///
/// Deterministic for a given `(images, seed)` pair: same seed and same
/// dimensions always yield the same tree shape and canvas.
pub fn optimize(images: &[Dimensions], seed: Option<u64>) -> Result<Layout, TreeError> {
    if images.is_empty() {
        return Err(TreeError::NoImages);
    }
    let n = images.len();

    // One or two images need no search: the only meaningful trees are a
    // lone leaf or a two-leaf split in either orientation.
    if n == 1 {
        let tree = SplitNode::Leaf(0);
        let canvas = canvas_for(&tree, images);
        return Ok(Layout { tree, canvas });
    }
    if n == 2 {
        return Ok(two_image_layout(images));
    }

    let mut rng = Pcg64::seed_from_u64(seed.unwrap_or(DEFAULT_SEED));
    let mut population = score_all(initial_trees(&mut rng, n), images);

    let mut best = Candidate {
        tree: SplitNode::Leaf(0),
        score: f64::INFINITY,
    };
    let mut stale = 0usize;

    for _ in 0..GENERATION_LIMIT {
        population.sort_by(|a, b| a.score.total_cmp(&b.score));
        if population[0].score < best.score {
            best = Candidate {
                tree: population[0].tree.clone(),
                score: population[0].score,
            };
            stale = 0;
        } else {
            stale += 1;
            if stale >= PATIENCE {
                break;
            }
        }

        let mut offspring: Vec<SplitNode> = population[..ELITE_COUNT.min(population.len())]
            .iter()
            .map(|candidate| candidate.tree.clone())
            .collect();
        while offspring.len() < POPULATION_SIZE {
            let parent_a = tournament(&mut rng, &population);
            let parent_b = tournament(&mut rng, &population);
            let mut child = crossover(parent_a, parent_b, &mut rng, n);
            if rng.random::<f64>() < MUTATION_RATE {
                mutate(&mut child, &mut rng);
            }
            offspring.push(child);
        }
        population = score_all(offspring, images);
    }

    // The final generation may hold an unexamined improvement.
    population.sort_by(|a, b| a.score.total_cmp(&b.score));
    if population[0].score < best.score {
        best = Candidate {
            tree: population[0].tree.clone(),
            score: population[0].score,
        };
    }

    let canvas = canvas_for(&best.tree, images);
    Ok(Layout {
        tree: best.tree,
        canvas,
    })
}

/// Canvas dimensions a tree implies: its aggregate aspect ratio, clamped
/// into the allowed band, realized at the fixed target area.
pub fn canvas_for(tree: &SplitNode, images: &[Dimensions]) -> Dimensions {
    let aspects: Vec<f64> = images.iter().map(Dimensions::aspect).collect();
    let aggregate = tree
        .aspect_ratio(&aspects)
        .clamp(MIN_CANVAS_ASPECT, MAX_CANVAS_ASPECT);
    let width = (TARGET_CANVAS_AREA * aggregate).sqrt().round().max(1.0) as u32;
    let height = (TARGET_CANVAS_AREA / aggregate).sqrt().round().max(1.0) as u32;
    Dimensions::new(width, height)
}

/// Score a candidate tree: the sum over leaves of the squared log-ratio
/// between the solved rectangle's aspect and the image's true aspect, plus
/// a small per-node term. Lower is better.
pub fn fitness(tree: &SplitNode, images: &[Dimensions]) -> f64 {
    let canvas = canvas_for(tree, images);
    let solved = match solve(tree, canvas, images) {
        Ok(solved) => solved,
        Err(_) => return f64::INFINITY,
    };
    let distortion: f64 = solved
        .leaf_rects
        .iter()
        .zip(images)
        .map(|(rect, image)| {
            let ratio = rect.aspect() / image.aspect();
            ratio.ln().powi(2)
        })
        .sum();
    distortion + NODE_COUNT_WEIGHT * tree.node_count() as f64
}

fn two_image_layout(images: &[Dimensions]) -> Layout {
    let side_by_side = SplitNode::split(
        Orientation::Horizontal,
        vec![SplitNode::Leaf(0), SplitNode::Leaf(1)],
    );
    let stacked = SplitNode::split(
        Orientation::Vertical,
        vec![SplitNode::Leaf(0), SplitNode::Leaf(1)],
    );
    let tree = if fitness(&stacked, images) < fitness(&side_by_side, images) {
        stacked
    } else {
        side_by_side
    };
    let canvas = canvas_for(&tree, images);
    Layout { tree, canvas }
}

fn score_all(trees: Vec<SplitNode>, images: &[Dimensions]) -> Vec<Candidate> {
    trees
        .into_par_iter()
        .map(|tree| {
            let score = fitness(&tree, images);
            Candidate { tree, score }
        })
        .collect()
}

fn tournament<'a, R: Rng>(rng: &mut R, population: &'a [Candidate]) -> &'a Candidate {
    let mut winner = &population[rng.random_range(0..population.len())];
    for _ in 1..TOURNAMENT_SIZE {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.score < winner.score {
            winner = challenger;
        }
    }
    winner
}

// =============================================================================
// Population seeding
// =============================================================================

/// Canonical shapes first (row, column, grid), then random balanced
/// trees, all normalized for replayable leaf binding.
fn initial_trees<R: Rng>(rng: &mut R, n: usize) -> Vec<SplitNode> {
    let mut trees = vec![
        comb(Orientation::Horizontal, 0..n),
        comb(Orientation::Vertical, 0..n),
    ];
    if n >= 4 {
        trees.push(grid(n));
    }
    while trees.len() < POPULATION_SIZE {
        trees.push(random_tree(rng, n));
    }
    for tree in &mut trees {
        normalize(tree);
    }
    trees
}

/// Left-deep binary comb: a single row (`Horizontal`) or column
/// (`Vertical`) of leaves.
fn comb(orientation: Orientation, range: std::ops::Range<usize>) -> SplitNode {
    let mut indices = range;
    let first = indices.next().unwrap_or(0);
    let mut node = SplitNode::Leaf(first);
    for index in indices {
        node = SplitNode::split(orientation, vec![node, SplitNode::Leaf(index)]);
    }
    node
}

/// Rows of roughly √n images, stacked.
fn grid(n: usize) -> SplitNode {
    let columns = (n as f64).sqrt().ceil() as usize;
    let mut rows: Vec<SplitNode> = Vec::new();
    let mut start = 0;
    while start < n {
        let end = (start + columns).min(n);
        rows.push(comb(Orientation::Horizontal, start..end));
        start = end;
    }
    let mut iter = rows.into_iter();
    let mut node = match iter.next() {
        Some(row) => row,
        None => return SplitNode::Leaf(0),
    };
    for row in iter {
        node = SplitNode::split(Orientation::Vertical, vec![node, row]);
    }
    node
}

/// Random balanced binary tree: random orientation at each internal node,
/// random partition of the leaf range into left/right subtrees.
fn random_tree<R: Rng>(rng: &mut R, n: usize) -> SplitNode {
    fn build<R: Rng>(rng: &mut R, count: usize) -> SplitNode {
        if count == 1 {
            // Placeholder index; normalize() renumbers.
            return SplitNode::Leaf(0);
        }
        let left = rng.random_range(1..count);
        let orientation = random_orientation(rng);
        SplitNode::split(
            orientation,
            vec![build(rng, left), build(rng, count - left)],
        )
    }
    let mut tree = build(rng, n);
    normalize(&mut tree);
    tree
}

fn random_orientation<R: Rng>(rng: &mut R) -> Orientation {
    if rng.random::<bool>() {
        Orientation::Horizontal
    } else {
        Orientation::Vertical
    }
}

// =============================================================================
// Genetic operators
// =============================================================================

/// Swap a randomly chosen subtree from each parent into the child.
///
/// Following the layout-optimization literature the original search used,
/// only subtrees with at least three leaves and matching leaf counts are
/// exchanged (anything smaller is equivalent to an orientation flip). When
/// no such pair exists the child is a plain copy of the first parent.
fn crossover<R: Rng>(
    parent_a: &Candidate,
    parent_b: &Candidate,
    rng: &mut R,
    n: usize,
) -> SplitNode {
    let sites_a = subtree_sites(&parent_a.tree);
    let sites_b = subtree_sites(&parent_b.tree);
    let pairs: Vec<(usize, usize)> = sites_a
        .iter()
        .flat_map(|&(position_a, leaves_a)| {
            sites_b
                .iter()
                .filter(move |&&(_, leaves_b)| leaves_b == leaves_a)
                .map(move |&(position_b, _)| (position_a, position_b))
        })
        .collect();

    let mut child = parent_a.tree.clone();
    if pairs.is_empty() {
        return child;
    }
    let (target, source) = pairs[rng.random_range(0..pairs.len())];
    let graft = subtree_at(&parent_b.tree, source).clone();
    replace_subtree(&mut child, target, graft);
    // Renumbering restores the leaf bijection: indices duplicated or lost
    // in the graft are rewritten in binding order.
    normalize(&mut child);
    debug_assert!(child.validate(n).is_ok());
    child
}

/// Internal positions (pre-order) whose subtrees hold at least three leaves.
fn subtree_sites(tree: &SplitNode) -> Vec<(usize, usize)> {
    fn walk(node: &SplitNode, position: &mut usize, out: &mut Vec<(usize, usize)>) {
        let here = *position;
        *position += 1;
        if let SplitNode::Split { children, .. } = node {
            let leaves = node.leaf_count();
            if leaves >= 3 {
                out.push((here, leaves));
            }
            for child in children {
                walk(child, position, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(tree, &mut 0, &mut out);
    out
}

fn subtree_at(tree: &SplitNode, target: usize) -> &SplitNode {
    fn find<'a>(
        node: &'a SplitNode,
        position: &mut usize,
        target: usize,
    ) -> Option<&'a SplitNode> {
        if *position == target {
            return Some(node);
        }
        *position += 1;
        if let SplitNode::Split { children, .. } = node {
            for child in children {
                if let Some(found) = find(child, position, target) {
                    return Some(found);
                }
            }
        }
        None
    }
    find(tree, &mut 0, target).unwrap_or(tree)
}

fn replace_subtree(tree: &mut SplitNode, target: usize, graft: SplitNode) {
    fn replace(
        node: &mut SplitNode,
        position: &mut usize,
        target: usize,
        graft: &mut Option<SplitNode>,
    ) {
        if *position == target {
            if let Some(graft) = graft.take() {
                *node = graft;
            }
            return;
        }
        *position += 1;
        if let SplitNode::Split { children, .. } = node {
            for child in children {
                replace(child, position, target, graft);
                if graft.is_none() {
                    return;
                }
            }
        }
    }
    replace(tree, &mut 0, target, &mut Some(graft));
}

/// Mutate in place: flip a split's orientation, or move a leaf into a
/// different split's child list.
fn mutate<R: Rng>(tree: &mut SplitNode, rng: &mut R) {
    match rng.random_range(0..2) {
        0 => flip_random_split(tree, rng),
        _ => move_random_leaf(tree, rng),
    }
}

fn flip_random_split<R: Rng>(tree: &mut SplitNode, rng: &mut R) {
    let splits = count_splits(tree);
    if splits == 0 {
        return;
    }
    let target = rng.random_range(0..splits);
    with_nth_split(tree, &mut 0, target, &mut |orientation, _| {
        *orientation = orientation.flipped();
    });
}

fn move_random_leaf<R: Rng>(tree: &mut SplitNode, rng: &mut R) {
    let n = tree.leaf_count();
    if n < 3 {
        return;
    }
    let victim = rng.random_range(0..n);
    let Some(mut pruned) = without_leaf(tree.clone(), victim) else {
        return;
    };

    let splits = count_splits(&pruned);
    if splits == 0 {
        pruned = SplitNode::split(random_orientation(rng), vec![pruned]);
    }
    let target = rng.random_range(0..count_splits(&pruned));
    let slot = rng.random::<u64>();
    with_nth_split(&mut pruned, &mut 0, target, &mut |_, children| {
        let position = (slot % (children.len() as u64 + 1)) as usize;
        children.insert(position, SplitNode::Leaf(victim));
    });
    normalize(&mut pruned);
    *tree = pruned;
}

/// Remove one leaf, collapsing any split left with a single child.
fn without_leaf(node: SplitNode, target: usize) -> Option<SplitNode> {
    match node {
        SplitNode::Leaf(index) if index == target => None,
        SplitNode::Leaf(index) => Some(SplitNode::Leaf(index)),
        SplitNode::Split {
            orientation,
            children,
        } => {
            let mut kept: Vec<SplitNode> = children
                .into_iter()
                .filter_map(|child| without_leaf(child, target))
                .collect();
            match kept.len() {
                0 => None,
                1 => kept.pop(),
                _ => Some(SplitNode::Split {
                    orientation,
                    children: kept,
                }),
            }
        }
    }
}

fn count_splits(node: &SplitNode) -> usize {
    match node {
        SplitNode::Leaf(_) => 0,
        SplitNode::Split { children, .. } => {
            1 + children.iter().map(count_splits).sum::<usize>()
        }
    }
}

fn with_nth_split(
    node: &mut SplitNode,
    position: &mut usize,
    target: usize,
    action: &mut impl FnMut(&mut Orientation, &mut Vec<SplitNode>),
) -> bool {
    if let SplitNode::Split {
        orientation,
        children,
    } = node
    {
        if *position == target {
            action(orientation, children);
            return true;
        }
        *position += 1;
        for child in children {
            if with_nth_split(child, position, target, action) {
                return true;
            }
        }
    }
    false
}

/// Bring a tree into the blueprint codec's normal form: internal children
/// before leaf children at every split (the wire format cannot express a
/// leaf to the left of a subtree), then leaves renumbered to the codec's
/// binding order so positional image binding reproduces this exact
/// geometry on replay.
///
/// The codec binds leaf slots per node in node-array order, so each
/// split's direct leaf children take the next indices before any leaves
/// deeper in its subtrees.
pub(crate) fn normalize(tree: &mut SplitNode) {
    fn reorder(node: &mut SplitNode) {
        if let SplitNode::Split { children, .. } = node {
            for child in children.iter_mut() {
                reorder(child);
            }
            children.sort_by_key(|child| matches!(child, SplitNode::Leaf(_)));
        }
    }
    fn renumber(node: &mut SplitNode, next: &mut usize) {
        if let SplitNode::Split { children, .. } = node {
            for child in children.iter_mut() {
                if let SplitNode::Leaf(index) = child {
                    *index = *next;
                    *next += 1;
                }
            }
            for child in children.iter_mut() {
                renumber(child, next);
            }
        }
    }
    reorder(tree);
    if let SplitNode::Leaf(index) = tree {
        *index = 0;
    }
    renumber(tree, &mut 0);
}
