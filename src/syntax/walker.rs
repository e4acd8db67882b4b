//! Bounded, cycle-safe depth-first traversal.
//!
//! The walker keeps an explicit work stack instead of recursing, so host
//! stack depth never depends on tree depth. Each call to [`walk`] owns a
//! fresh visited set; sets are never shared between searches.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Point, SyntaxNode};

/// Traversal ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WalkLimits {
    /// Children of nodes at this depth are not visited (root is depth 0).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Total distinct nodes visited before the walk stops.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Children visited per node; the rest are skipped.
    #[serde(default = "default_max_children")]
    pub max_children: usize,
}

fn default_max_depth() -> usize {
    500
}

fn default_max_nodes() -> usize {
    10_000
}

fn default_max_children() -> usize {
    50
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            max_children: default_max_children(),
        }
    }
}

/// What the walker does after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into the node's children.
    Continue,
    /// Do not descend into this node; continue with its siblings.
    SkipChildren,
    /// End the walk.
    Stop,
}

/// Counters describing what a walk visited and what it cut off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub visited: usize,
    /// Nodes skipped because their identity or position was already seen.
    pub duplicates: usize,
    pub depth_truncations: usize,
    pub fanout_truncations: usize,
    /// Child indices the tree failed to produce.
    pub missing_children: usize,
    pub node_limit_hit: bool,
    pub stopped: bool,
}

impl WalkStats {
    /// Whether any part of the tree was left unvisited by a ceiling.
    pub fn is_truncated(&self) -> bool {
        self.node_limit_hit || self.depth_truncations > 0 || self.fanout_truncations > 0
    }
}

/// Secondary identity: `(kind, startRow, startCol, endRow, endCol)`.
type PositionKey = (String, usize, usize, usize, usize);

fn position_key<N: SyntaxNode>(node: &N) -> PositionKey {
    let (start_row, start_col) = node.start_point();
    let (end_row, end_col) = node.end_point();
    (node.kind().to_string(), start_row, start_col, end_row, end_col)
}

/// Walk `root` and its descendants in source order.
///
/// The visitor receives each node with its depth (root is 0). Nodes already
/// seen by identity or by position are skipped. Ceiling violations are
/// logged and recorded in the returned stats; the walk itself never fails.
pub fn walk<N, F>(root: N, limits: &WalkLimits, mut visitor: F) -> WalkStats
where
    N: SyntaxNode,
    F: FnMut(N, usize) -> Visit,
{
    let mut stats = WalkStats::default();
    let mut seen_ids: HashSet<usize> = HashSet::new();
    let mut seen_positions: HashSet<PositionKey> = HashSet::new();
    let mut stack: Vec<(N, usize)> = vec![(root, 0)];
    let mut children: Vec<N> = Vec::with_capacity(limits.max_children);

    while let Some((node, depth)) = stack.pop() {
        if !seen_ids.insert(node.identity()) {
            stats.duplicates += 1;
            debug!(kind = node.kind(), depth, "node already visited, skipping");
            continue;
        }
        if !seen_positions.insert(position_key(&node)) {
            stats.duplicates += 1;
            debug!(kind = node.kind(), depth, "node position already visited, skipping");
            continue;
        }
        if stats.visited >= limits.max_nodes {
            stats.node_limit_hit = true;
            warn!(max_nodes = limits.max_nodes, "node ceiling reached, truncating walk");
            break;
        }
        stats.visited += 1;

        match visitor(node, depth) {
            Visit::Continue => {}
            Visit::SkipChildren => continue,
            Visit::Stop => {
                stats.stopped = true;
                break;
            }
        }

        let count = node.child_count();
        if count == 0 {
            continue;
        }
        if depth >= limits.max_depth {
            stats.depth_truncations += 1;
            debug!(kind = node.kind(), depth, "depth ceiling reached, truncating branch");
            continue;
        }

        let take = count.min(limits.max_children);
        if count > take {
            stats.fanout_truncations += 1;
            debug!(
                kind = node.kind(),
                children = count,
                skipped = count - take,
                "fan-out ceiling reached, skipping excess children"
            );
        }

        children.clear();
        for index in 0..take {
            match node.child(index) {
                Some(child) => children.push(child),
                None => {
                    stats.missing_children += 1;
                    debug!(kind = node.kind(), index, "child unavailable, continuing");
                }
            }
        }
        // Reversed so the first child is popped first.
        stack.extend(children.drain(..).rev().map(|child| (child, depth + 1)));
    }

    stats
}

/// First node in source order (including `root`) that satisfies `predicate`.
pub fn find_first<N, P>(root: N, limits: &WalkLimits, mut predicate: P) -> Option<N>
where
    N: SyntaxNode,
    P: FnMut(N) -> bool,
{
    let mut found = None;
    walk(root, limits, |node, _| {
        if predicate(node) {
            found = Some(node);
            Visit::Stop
        } else {
            Visit::Continue
        }
    });
    found
}

/// Deepest node whose range contains `point`.
pub fn find_node_at<N: SyntaxNode>(root: N, limits: &WalkLimits, point: Point) -> Option<N> {
    let mut best = None;
    walk(root, limits, |node, _| {
        if node.contains_point(point) {
            best = Some(node);
            Visit::Continue
        } else {
            Visit::SkipChildren
        }
    });
    best
}
