//! Syntax tree access and the bounded traversal primitive.
//!
//! Analyzers never recurse over a tree themselves. Every traversal goes
//! through [`walk`], which enforces depth, node and fan-out ceilings and
//! skips nodes it has already seen, so malformed or self-referential trees
//! cannot overflow the stack or loop forever.
//!
//! The [`SyntaxNode`] trait is the small surface the walker needs. It is
//! implemented for `tree_sitter::Node` and can be implemented for any other
//! tree representation (the walker tests use an arena with cycles).

mod walker;

pub use walker::{find_first, find_node_at, walk, Visit, WalkLimits, WalkStats};

/// Zero-based `(row, column)` position.
pub type Point = (usize, usize);

/// A node in a concrete syntax tree.
///
/// Nodes are cheap handles (`Copy`) into a tree owned elsewhere.
pub trait SyntaxNode: Copy {
    /// Identity of the node instance. Two handles to the same node
    /// must return the same value.
    fn identity(&self) -> usize;

    /// Grammar node type, e.g. `call_expression`.
    fn kind(&self) -> &str;

    /// Start position (inclusive).
    fn start_point(&self) -> Point;

    /// End position (exclusive).
    fn end_point(&self) -> Point;

    /// Number of children, named and anonymous.
    fn child_count(&self) -> usize;

    /// Child at `index`, or `None` if the tree cannot produce it.
    fn child(&self, index: usize) -> Option<Self>;

    /// Whether `point` falls inside this node's range.
    fn contains_point(&self, point: Point) -> bool {
        self.start_point() <= point && point < self.end_point()
    }
}

impl<'tree> SyntaxNode for tree_sitter::Node<'tree> {
    fn identity(&self) -> usize {
        self.id()
    }

    fn kind(&self) -> &str {
        tree_sitter::Node::kind(self)
    }

    fn start_point(&self) -> Point {
        let p = self.start_position();
        (p.row, p.column)
    }

    fn end_point(&self) -> Point {
        let p = self.end_position();
        (p.row, p.column)
    }

    fn child_count(&self) -> usize {
        tree_sitter::Node::child_count(self)
    }

    fn child(&self, index: usize) -> Option<Self> {
        tree_sitter::Node::child(self, index)
    }
}

/// Text of a tree-sitter node, or an empty string when the range is not UTF-8.
pub fn node_text<'a>(node: tree_sitter::Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// 1-indexed start line of a tree-sitter node.
pub fn start_line(node: tree_sitter::Node) -> usize {
    node.start_position().row + 1
}

/// 1-indexed end line of a tree-sitter node.
pub fn end_line(node: tree_sitter::Node) -> usize {
    node.end_position().row + 1
}
