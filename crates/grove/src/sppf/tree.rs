use crate::error::{ParseMetrics, ParseTreeError};
use crate::runtime::{RuntimeRule, RuntimeRuleSet};
use crate::sppf::visitor::{AlternativeSelection, SppfVisitor, SppfWalker, TextCollector};
use crate::sppf::{NodeId, NodeIdentity, PackedAlternative, SppfNode, TextRange};
use hashbrown::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::sync::Arc;

/// Frozen result of a parse
///
/// Cheap to clone: the input, the rule set and the node arena are shared.
/// The root is always node 0.
#[derive(Clone)]
pub struct SharedPackedParseTree {
    input: Arc<str>,
    rules: Arc<RuntimeRuleSet>,
    nodes: Arc<[SppfNode]>,
    metrics: ParseMetrics,
}

impl SharedPackedParseTree {
    pub(crate) fn new(
        input: Arc<str>,
        rules: Arc<RuntimeRuleSet>,
        nodes: Vec<SppfNode>,
        metrics: ParseMetrics,
    ) -> Self {
        Self {
            input,
            rules,
            nodes: nodes.into(),
            metrics,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: NodeId::new(0),
        }
    }

    /// # Errors
    ///
    /// Returns [`ParseTreeError::UnknownNode`] if `id` is not in this forest.
    pub fn node(&self, id: NodeId) -> Result<NodeRef<'_>, ParseTreeError> {
        if id.index() < self.nodes.len() {
            Ok(NodeRef { tree: self, id })
        } else {
            Err(ParseTreeError::UnknownNode(id.index()))
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.nodes.len()).map(move |index| NodeRef {
            tree: self,
            id: NodeId::new(index),
        })
    }

    /// The full parsed text
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub const fn rule_set(&self) -> &Arc<RuntimeRuleSet> {
        &self.rules
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub const fn metrics(&self) -> &ParseMetrics {
        &self.metrics
    }

    /// Whether any node has more than one packed alternative
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.nodes.iter().any(|node| node.alternatives().len() > 1)
    }

    /// Number of distinct trees packed in this forest, saturating at `u64::MAX`
    #[must_use]
    pub fn count_trees(&self) -> u64 {
        let mut counts: Vec<Option<u64>> = vec![None; self.nodes.len()];
        let mut stack = vec![(NodeId::new(0), false)];

        while let Some((id, ready)) = stack.pop() {
            if counts[id.index()].is_some() {
                continue;
            }
            let node = &self.nodes[id.index()];
            if node.is_leaf() {
                counts[id.index()] = Some(1);
            } else if ready {
                let total = node
                    .alternatives()
                    .iter()
                    .map(|alternative| {
                        alternative
                            .children
                            .iter()
                            .map(|child| counts[child.index()].unwrap_or(1))
                            .fold(1u64, u64::saturating_mul)
                    })
                    .fold(0u64, u64::saturating_add);
                counts[id.index()] = Some(total);
            } else {
                stack.push((id, true));
                for alternative in node.alternatives() {
                    stack.extend(
                        alternative
                            .children
                            .iter()
                            .filter(|child| counts[child.index()].is_none())
                            .map(|child| (*child, false)),
                    );
                }
            }
        }

        counts.first().copied().flatten().unwrap_or(0)
    }

    /// Concatenated leaf text along the first alternative of every branch
    ///
    /// Skip derivations are part of the forest, so for a successful parse this
    /// is the whole input.
    #[must_use]
    pub fn reconstruct_text(&self) -> String {
        let mut collector = TextCollector::default();
        let _ = self.walk(&mut collector, AlternativeSelection::First);
        collector.into_text()
    }

    /// Walk the forest from the root in pre-order
    pub fn walk<V: SppfVisitor>(
        &self,
        visitor: &mut V,
        selection: AlternativeSelection,
    ) -> ControlFlow<()> {
        SppfWalker::new(visitor)
            .with_selection(selection)
            .walk(self.root())
    }

    fn raw(&self, id: NodeId) -> &SppfNode {
        &self.nodes[id.index()]
    }
}

impl fmt::Debug for SharedPackedParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self.root();
        f.debug_struct("SharedPackedParseTree")
            .field("grammar", &self.rules.grammar_name())
            .field("root", &root.name())
            .field("range", &root.range())
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for SharedPackedParseTree {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl Eq for SharedPackedParseTree {}

impl Hash for SharedPackedParseTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root().hash(state);
    }
}

/// A node of a [`SharedPackedParseTree`]
///
/// Equality is structural: two nodes are equal when they carry the same rule
/// name and span, and their alternatives match as sets. Nodes from different
/// forests, even over different grammars, can be compared.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SharedPackedParseTree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn tree(&self) -> &'t SharedPackedParseTree {
        self.tree
    }

    #[must_use]
    pub fn identity(&self) -> NodeIdentity {
        self.tree.raw(self.id).identity()
    }

    #[must_use]
    pub fn rule(&self) -> &'t RuntimeRule {
        self.tree.rules.rule(self.identity().rule)
    }

    /// Rule name, or the terminal description for leaves
    #[must_use]
    pub fn name(&self) -> &'t str {
        self.tree.rules.name(self.identity().rule)
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        self.identity().range()
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.identity().start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.identity().end
    }

    #[must_use]
    pub fn matched_text(&self) -> &'t str {
        let identity = self.identity();
        self.tree.input.get(identity.start..identity.end).unwrap_or("")
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.tree.raw(self.id).is_leaf()
    }

    #[must_use]
    pub fn is_branch(&self) -> bool {
        !self.is_leaf()
    }

    /// Derived by a skip rule
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.rule().is_skip()
    }

    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        self.rule().is_pseudo()
    }

    /// The zero-width leaf standing in for an empty repetition
    #[must_use]
    pub fn is_empty_leaf(&self) -> bool {
        self.identity().rule == self.tree.rules.empty_terminal()
    }

    /// # Errors
    ///
    /// Returns [`ParseTreeError::NotABranch`] for leaves.
    pub fn as_branch(&self) -> Result<BranchRef<'t>, ParseTreeError> {
        if self.is_branch() {
            Ok(BranchRef { node: *self })
        } else {
            Err(ParseTreeError::NotABranch {
                name: self.name().to_string(),
                range: self.range(),
            })
        }
    }

    /// # Errors
    ///
    /// Returns [`ParseTreeError::NotALeaf`] for branches.
    pub fn as_leaf(&self) -> Result<LeafRef<'t>, ParseTreeError> {
        if self.is_leaf() {
            Ok(LeafRef { node: *self })
        } else {
            Err(ParseTreeError::NotALeaf {
                name: self.name().to_string(),
                range: self.range(),
            })
        }
    }

    fn packed(&self) -> &'t [PackedAlternative] {
        self.tree.raw(self.id).alternatives()
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("range", &self.range())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        structurally_equal(*self, *other)
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.start().hash(state);
        self.end().hash(state);
        self.packed().len().hash(state);
    }
}

type Pair = (NodeId, NodeId);

/// Largest relation of node pairs that agree on name, span and text, and
/// whose alternatives match as sets
///
/// Every pair reachable from `(a, b)` that passes the shallow check starts
/// out equal; pairs whose alternatives then fail to match are refuted and the
/// refutation spreads to the pairs that relied on them. No recursion, so
/// forest depth is not bounded by the native stack.
fn structurally_equal(a: NodeRef<'_>, b: NodeRef<'_>) -> bool {
    let (left, right) = (a.tree, b.tree);
    let mut verdicts: HashMap<Pair, bool, ahash::RandomState> = HashMap::default();
    let mut parents: HashMap<Pair, Vec<Pair>, ahash::RandomState> = HashMap::default();
    let mut refuted = Vec::new();
    let mut candidates = Vec::new();
    let mut stack = vec![(a.id, b.id)];

    while let Some(pair) = stack.pop() {
        if verdicts.contains_key(&pair) {
            continue;
        }
        let x = NodeRef { tree: left, id: pair.0 };
        let y = NodeRef { tree: right, id: pair.1 };
        let shallow = shallow_equal(x, y);
        verdicts.insert(pair, shallow);
        if !shallow {
            refuted.push(pair);
            continue;
        }
        candidates.push(pair);
        for l in x.packed() {
            for r in y.packed().iter().filter(|r| r.children.len() == l.children.len()) {
                for child in l.children.iter().copied().zip(r.children.iter().copied()) {
                    parents.entry(child).or_default().push(pair);
                    stack.push(child);
                }
            }
        }
    }

    for pair in candidates {
        let x = NodeRef { tree: left, id: pair.0 };
        let y = NodeRef { tree: right, id: pair.1 };
        if !alternatives_match(x, y, &verdicts) {
            verdicts.insert(pair, false);
            refuted.push(pair);
        }
    }
    while let Some(pair) = refuted.pop() {
        let Some(dependents) = parents.get(&pair) else {
            continue;
        };
        for parent in dependents {
            if verdicts.get(parent) != Some(&true) {
                continue;
            }
            let x = NodeRef { tree: left, id: parent.0 };
            let y = NodeRef { tree: right, id: parent.1 };
            if !alternatives_match(x, y, &verdicts) {
                verdicts.insert(*parent, false);
                refuted.push(*parent);
            }
        }
    }

    verdicts.get(&(a.id, b.id)).copied().unwrap_or(false)
}

fn shallow_equal(a: NodeRef<'_>, b: NodeRef<'_>) -> bool {
    a.name() == b.name()
        && a.start() == b.start()
        && a.end() == b.end()
        && a.is_leaf() == b.is_leaf()
        && a.packed().len() == b.packed().len()
        && (a.is_branch() || a.matched_text() == b.matched_text())
}

fn alternatives_match(a: NodeRef<'_>, b: NodeRef<'_>, verdicts: &HashMap<Pair, bool, ahash::RandomState>) -> bool {
    a.packed().iter().all(|l| {
        b.packed().iter().any(|r| {
            l.children.len() == r.children.len()
                && l.children
                    .iter()
                    .zip(&r.children)
                    .all(|(x, y)| verdicts.get(&(*x, *y)) == Some(&true))
        })
    })
}

/// A branch node: one or more packed alternatives
#[derive(Clone, Copy, Debug)]
pub struct BranchRef<'t> {
    node: NodeRef<'t>,
}

impl<'t> BranchRef<'t> {
    #[must_use]
    pub const fn node(&self) -> NodeRef<'t> {
        self.node
    }

    #[must_use]
    pub fn name(&self) -> &'t str {
        self.node.name()
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        self.node.range()
    }

    #[must_use]
    pub fn alternative_count(&self) -> usize {
        self.node.packed().len()
    }

    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.alternative_count() > 1
    }

    pub fn alternatives(&self) -> impl Iterator<Item = AlternativeRef<'t>> + 't {
        let node = self.node;
        (0..self.alternative_count()).map(move |index| AlternativeRef { node, index })
    }

    /// # Errors
    ///
    /// Returns [`ParseTreeError::AlternativeOutOfRange`] if there is no such alternative.
    pub fn alternative(&self, index: usize) -> Result<AlternativeRef<'t>, ParseTreeError> {
        let len = self.alternative_count();
        if index < len {
            Ok(AlternativeRef {
                node: self.node,
                index,
            })
        } else {
            Err(ParseTreeError::AlternativeOutOfRange {
                name: self.name().to_string(),
                index,
                len,
            })
        }
    }

    /// Children of the first alternative
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.node.tree;
        self.first_children()
            .iter()
            .map(move |id| NodeRef { tree, id: *id })
    }

    /// Children of the first alternative, leaving out skip derivations
    pub fn non_skip_children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        self.children().filter(|child| !child.is_skip())
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.first_children().len()
    }

    /// Child `index` of the first alternative
    ///
    /// # Errors
    ///
    /// Returns [`ParseTreeError::ChildOutOfRange`] if there is no such child.
    pub fn child(&self, index: usize) -> Result<NodeRef<'t>, ParseTreeError> {
        let children = self.first_children();
        children
            .get(index)
            .map(|id| NodeRef {
                tree: self.node.tree,
                id: *id,
            })
            .ok_or_else(|| ParseTreeError::ChildOutOfRange {
                name: self.name().to_string(),
                index,
                len: children.len(),
            })
    }

    fn first_children(&self) -> &'t [NodeId] {
        self.node
            .packed()
            .first()
            .map_or(&[][..], |alternative| alternative.children.as_slice())
    }
}

/// A terminal match or the empty leaf
#[derive(Clone, Copy, Debug)]
pub struct LeafRef<'t> {
    node: NodeRef<'t>,
}

impl<'t> LeafRef<'t> {
    #[must_use]
    pub const fn node(&self) -> NodeRef<'t> {
        self.node
    }

    #[must_use]
    pub fn text(&self) -> &'t str {
        self.node.matched_text()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_empty_leaf()
    }
}

/// One packed alternative of a branch
#[derive(Clone, Copy, Debug)]
pub struct AlternativeRef<'t> {
    node: NodeRef<'t>,
    index: usize,
}

impl<'t> AlternativeRef<'t> {
    /// The branch this alternative derives
    #[must_use]
    pub const fn parent(&self) -> NodeRef<'t> {
        self.node
    }

    /// Position among the branch's alternatives
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Index of the grammar choice alternative that produced this derivation
    #[must_use]
    pub fn option(&self) -> usize {
        self.packed().option
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packed().children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packed().children.is_empty()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.node.tree;
        self.packed()
            .children
            .iter()
            .map(move |id| NodeRef { tree, id: *id })
    }

    /// # Errors
    ///
    /// Returns [`ParseTreeError::ChildOutOfRange`] if there is no such child.
    pub fn child(&self, index: usize) -> Result<NodeRef<'t>, ParseTreeError> {
        let children = &self.packed().children;
        children
            .get(index)
            .map(|id| NodeRef {
                tree: self.node.tree,
                id: *id,
            })
            .ok_or_else(|| ParseTreeError::ChildOutOfRange {
                name: self.node.name().to_string(),
                index,
                len: children.len(),
            })
    }

    fn packed(&self) -> &'t PackedAlternative {
        &self.node.packed()[self.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder};
    use crate::parser::ScannerlessParser;

    fn parse(grammar: &Arc<crate::grammar::Grammar>, goal: &str, text: &str) -> SharedPackedParseTree {
        ScannerlessParser::new(grammar)
            .expect("grammar compiles")
            .parse(goal, text)
            .expect("text parses")
    }

    fn abc() -> Arc<crate::grammar::Grammar> {
        GrammarBuilder::new("test", "Abc")
            .rule(
                "abc",
                Expr::concatenation([Expr::non_terminal("ab"), Expr::non_terminal("c")]),
            )
            .rule(
                "ab",
                Expr::concatenation([Expr::non_terminal("a"), Expr::non_terminal("b")]),
            )
            .rule("a", Expr::literal("a"))
            .rule("b", Expr::literal("b"))
            .rule("c", Expr::literal("c"))
            .build()
            .expect("valid grammar")
    }

    #[test]
    fn test_navigation() {
        let tree = parse(&abc(), "abc", "abc");
        let root = tree.root().as_branch().expect("branch");
        assert_eq!(root.name(), "abc");
        assert_eq!(root.child_count(), 2);

        let ab = root.child(0).expect("ab").as_branch().expect("branch");
        assert_eq!(ab.name(), "ab");
        assert_eq!(ab.range(), TextRange::of(0, 2));

        let b = ab.child(1).expect("b");
        assert_eq!(b.matched_text(), "b");
        let leaf = b.as_branch().expect("b").child(0).expect("leaf");
        assert_eq!(leaf.as_leaf().expect("leaf").text(), "b");
        assert_eq!(leaf.name(), "'b'");
    }

    #[test]
    fn test_query_errors() {
        let tree = parse(&abc(), "abc", "abc");
        let root = tree.root().as_branch().expect("branch");
        assert!(matches!(
            root.child(5),
            Err(ParseTreeError::ChildOutOfRange { index: 5, len: 2, .. })
        ));
        assert!(matches!(
            root.alternative(1),
            Err(ParseTreeError::AlternativeOutOfRange { index: 1, len: 1, .. })
        ));
        assert!(matches!(tree.root().as_leaf(), Err(ParseTreeError::NotALeaf { .. })));
        assert!(matches!(
            tree.node(NodeId::new(999)),
            Err(ParseTreeError::UnknownNode(999))
        ));
    }

    #[test]
    fn test_only_reachable_nodes_kept() {
        let tree = parse(&abc(), "abc", "abc");
        // abc, ab, a, 'a', b, 'b', c, 'c'
        assert_eq!(tree.node_count(), 8);
        assert!(!tree.is_ambiguous());
        assert_eq!(tree.count_trees(), 1);
    }

    #[test]
    fn test_structural_equality_across_parses() {
        let grammar = abc();
        let first = parse(&grammar, "abc", "abc");
        let second = parse(&grammar, "abc", "abc");
        assert_eq!(first, second);

        let ab = parse(&grammar, "ab", "ab");
        assert_ne!(first.root(), ab.root());
        let inner = first
            .root()
            .as_branch()
            .and_then(|root| root.child(0))
            .expect("ab child");
        assert_eq!(inner, ab.root());
    }

    #[test]
    fn test_reconstruct_text() {
        let tree = parse(&abc(), "abc", "abc");
        assert_eq!(tree.reconstruct_text(), "abc");
    }

    /// `s(0, n)` nested `n` levels deep to the left, one leaf per level
    fn left_chain(rules: &Arc<RuntimeRuleSet>, text: &str) -> SharedPackedParseTree {
        let rule = rules.find("s").expect("rule");
        let len = text.len();
        let mut nodes = Vec::with_capacity(2 * len);
        for depth in 0..len {
            let end = len - depth;
            let leaf = NodeId::new(2 * depth + 1);
            let children = if end > 1 {
                smallvec::smallvec![NodeId::new(2 * depth + 2), leaf]
            } else {
                smallvec::smallvec![leaf]
            };
            nodes.push(SppfNode::Branch {
                identity: NodeIdentity::new(rule, 0, end),
                alternatives: vec![PackedAlternative { option: 0, children }],
            });
            nodes.push(SppfNode::Leaf {
                identity: NodeIdentity::new(rule, end - 1, end),
            });
        }
        SharedPackedParseTree::new(Arc::from(text), Arc::clone(rules), nodes, ParseMetrics::default())
    }

    #[test]
    fn test_equality_on_deep_forests() {
        let grammar = GrammarBuilder::new("test", "Deep")
            .rule(
                "s",
                Expr::choice([
                    Expr::concatenation([Expr::non_terminal("s"), Expr::literal("a")]),
                    Expr::literal("a"),
                ]),
            )
            .build()
            .expect("valid grammar");
        let rules = grammar.runtime_rule_set().expect("compiles");
        let text = "a".repeat(50_000);
        let first = left_chain(&rules, &text);
        let second = left_chain(&rules, &text);
        assert_eq!(first, second);

        let altered = format!("b{}", &text[1..]);
        let third = left_chain(&rules, &altered);
        assert_ne!(first, third);
    }
}
