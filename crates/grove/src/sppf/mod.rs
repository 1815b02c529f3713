//! # Shared Packed Parse Forests
//!
//! The result of a parse. Every node is identified by its
//! [`NodeIdentity`]: the runtime rule that derived it plus the span it
//! covers. A node exists at most once per identity, so sub-derivations are
//! shared between every parent that uses them.
//!
//! - A **leaf** is a matched terminal, or the empty-leaf sentinel standing
//!   for a repetition with zero items.
//! - A **branch** holds one or more *packed alternatives*: ordered child
//!   lists that each derive the branch's span. An unambiguous parse has
//!   exactly one alternative per branch.
//!
//! Nodes live in a flat arena and refer to children by [`NodeId`]. The
//! arena is built by the parser and frozen into a [`SharedPackedParseTree`]
//! containing only the nodes reachable from the root.
//!
//! ## Querying
//!
//! ```rust
//! use grove::grammar::{Expr, GrammarBuilder};
//! use grove::parser::ScannerlessParser;
//!
//! let grammar = GrammarBuilder::new("test", "Pairs")
//!     .rule("pair", Expr::concatenation([Expr::non_terminal("a"), Expr::non_terminal("b")]))
//!     .rule("a", Expr::literal("a"))
//!     .rule("b", Expr::literal("b"))
//!     .build()?;
//! let parser = ScannerlessParser::new(&grammar)?;
//! let tree = parser.parse("pair", "ab")?;
//!
//! let root = tree.root().as_branch()?;
//! assert_eq!(root.child(1)?.name(), "b");
//! assert_eq!(tree.to_string(), "pair{a{'a'} b{'b'}}");
//! assert_eq!(tree.reconstruct_text(), "ab");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub(crate) mod forest;
mod pretty;
mod text;
mod tree;
mod visitor;

pub use text::{TextRange, TextSize};
pub use tree::{AlternativeRef, BranchRef, LeafRef, NodeRef, SharedPackedParseTree};
pub use visitor::{AlternativeSelection, SppfVisitor, SppfWalker};

use crate::runtime::RuleId;
use smallvec::SmallVec;

/// Index of a node in a forest arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// `(rule, start, end)`: the key under which a node is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub rule: RuleId,
    pub start: usize,
    pub end: usize,
}

impl NodeIdentity {
    #[must_use]
    pub const fn new(rule: RuleId, start: usize, end: usize) -> Self {
        Self { rule, start, end }
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        TextRange::of(self.start, self.end)
    }

    #[must_use]
    pub const fn same_span(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// Child list of one packed alternative
pub type Children = SmallVec<[NodeId; 4]>;

/// One way of deriving a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAlternative {
    /// Index of the choice alternative that produced this derivation
    pub option: usize,
    pub children: Children,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SppfNode {
    Leaf {
        identity: NodeIdentity,
    },
    Branch {
        identity: NodeIdentity,
        alternatives: Vec<PackedAlternative>,
    },
}

impl SppfNode {
    #[must_use]
    pub const fn identity(&self) -> NodeIdentity {
        match self {
            Self::Leaf { identity } | Self::Branch { identity, .. } => *identity,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Packed alternatives; empty for leaves
    #[must_use]
    pub fn alternatives(&self) -> &[PackedAlternative] {
        match self {
            Self::Leaf { .. } => &[],
            Self::Branch { alternatives, .. } => alternatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_span() {
        let a = NodeIdentity::new(RuleId::new(1), 2, 5);
        let b = NodeIdentity::new(RuleId::new(4), 2, 5);
        assert!(a.same_span(&b));
        assert_ne!(a, b);
        assert_eq!(a.range(), TextRange::of(2, 5));
    }

    #[test]
    fn test_leaf_has_no_alternatives() {
        let leaf = SppfNode::Leaf {
            identity: NodeIdentity::new(RuleId::new(0), 0, 1),
        };
        assert!(leaf.is_leaf());
        assert!(leaf.alternatives().is_empty());
    }
}
