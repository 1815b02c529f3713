use crate::sppf::{AlternativeRef, BranchRef, LeafRef, NodeRef};
use std::ops::ControlFlow;

/// Trait for visiting parse forests
pub trait SppfVisitor {
    /// Called when entering a branch (before its alternatives)
    fn enter_branch(&mut self, branch: BranchRef<'_>) -> ControlFlow<()> {
        let _ = branch;
        ControlFlow::Continue(())
    }

    /// Called when exiting a branch (after its alternatives)
    fn exit_branch(&mut self, branch: BranchRef<'_>) -> ControlFlow<()> {
        let _ = branch;
        ControlFlow::Continue(())
    }

    /// Called before the children of each visited alternative
    fn enter_alternative(&mut self, alternative: AlternativeRef<'_>) -> ControlFlow<()> {
        let _ = alternative;
        ControlFlow::Continue(())
    }

    fn visit_leaf(&mut self, leaf: LeafRef<'_>) -> ControlFlow<()> {
        let _ = leaf;
        ControlFlow::Continue(())
    }
}

/// Which packed alternatives of an ambiguous branch the walker descends into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlternativeSelection {
    /// Only the first alternative, giving a single tree
    #[default]
    First,
    /// Every alternative; shared nodes are visited once per path to them
    All,
}

/// Walker that drives forest traversal and calls visitor methods
pub struct SppfWalker<'v, V> {
    visitor: &'v mut V,
    selection: AlternativeSelection,
}

impl<'v, V: SppfVisitor> SppfWalker<'v, V> {
    pub fn new(visitor: &'v mut V) -> Self {
        Self {
            visitor,
            selection: AlternativeSelection::First,
        }
    }

    #[must_use]
    pub const fn with_selection(mut self, selection: AlternativeSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Walk in pre-order (branch before children)
    pub fn walk(&mut self, root: NodeRef<'_>) -> ControlFlow<()> {
        let Ok(branch) = root.as_branch() else {
            return self.visit_leaf(root);
        };
        self.visitor.enter_branch(branch)?;
        self.walk_alternatives(branch, Self::walk)?;
        self.visitor.exit_branch(branch)
    }

    /// Walk in post-order (branch after children); `enter_branch` is not called
    pub fn walk_postorder(&mut self, root: NodeRef<'_>) -> ControlFlow<()> {
        let Ok(branch) = root.as_branch() else {
            return self.visit_leaf(root);
        };
        self.walk_alternatives(branch, Self::walk_postorder)?;
        self.visitor.exit_branch(branch)
    }

    fn walk_alternatives(
        &mut self,
        branch: BranchRef<'_>,
        descend: fn(&mut Self, NodeRef<'_>) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let take = match self.selection {
            AlternativeSelection::First => 1,
            AlternativeSelection::All => usize::MAX,
        };
        for alternative in branch.alternatives().take(take) {
            self.visitor.enter_alternative(alternative)?;
            for child in alternative.children() {
                descend(self, child)?;
            }
        }
        ControlFlow::Continue(())
    }

    fn visit_leaf(&mut self, node: NodeRef<'_>) -> ControlFlow<()> {
        match node.as_leaf() {
            Ok(leaf) => self.visitor.visit_leaf(leaf),
            Err(_) => ControlFlow::Continue(()),
        }
    }
}

/// Concatenates leaf text in visiting order
#[derive(Debug, Default)]
pub(crate) struct TextCollector {
    text: String,
}

impl TextCollector {
    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

impl SppfVisitor for TextCollector {
    fn visit_leaf(&mut self, leaf: LeafRef<'_>) -> ControlFlow<()> {
        self.text.push_str(leaf.text());
        ControlFlow::Continue(())
    }
}
