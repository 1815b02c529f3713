use crate::sppf::{Children, NodeId, NodeIdentity, PackedAlternative, SppfNode};
use hashbrown::{HashMap, HashSet};

/// Mutable node arena used while parsing
///
/// Nodes are interned by identity. Every change that could let a pending
/// derivation grow (a new node, a new or replaced alternative) bumps the
/// revision counter, which the parser uses to detect a fixpoint.
#[derive(Debug, Default)]
pub(crate) struct Forest {
    nodes: Vec<SppfNode>,
    index: HashMap<NodeIdentity, NodeId, ahash::RandomState>,
    /// Child lists already packed under each branch
    packed: HashMap<NodeId, HashSet<Children, ahash::RandomState>, ahash::RandomState>,
    revision: u64,
}

impl Forest {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) const fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn get(&self, id: NodeId) -> &SppfNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn identity(&self, id: NodeId) -> NodeIdentity {
        self.nodes[id.index()].identity()
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (NodeId, &SppfNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index), node))
    }

    pub(crate) fn leaf(&mut self, identity: NodeIdentity) -> NodeId {
        self.intern(identity, || SppfNode::Leaf { identity })
    }

    pub(crate) fn branch(&mut self, identity: NodeIdentity) -> NodeId {
        self.intern(identity, || SppfNode::Branch {
            identity,
            alternatives: Vec::new(),
        })
    }

    fn intern(&mut self, identity: NodeIdentity, make: impl FnOnce() -> SppfNode) -> NodeId {
        if let Some(id) = self.index.get(&identity) {
            return *id;
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(make());
        self.index.insert(identity, id);
        self.revision += 1;
        id
    }

    /// Record a derivation of `node`; returns whether the forest changed
    ///
    /// Duplicate child lists are ignored, as are derivations that would make
    /// `node` reachable from itself. Under `priority`, an alternative with a
    /// lower option than the current best is discarded and a higher one
    /// replaces every existing alternative.
    pub(crate) fn add_alternative(
        &mut self,
        node: NodeId,
        option: usize,
        children: Children,
        priority: bool,
    ) -> bool {
        if self.nodes[node.index()].is_leaf() {
            return false;
        }
        if self
            .packed
            .get(&node)
            .is_some_and(|known| known.contains(&children))
        {
            return false;
        }
        // Under priority every kept alternative carries the best option.
        let best = if priority {
            self.nodes[node.index()]
                .alternatives()
                .first()
                .map(|alternative| alternative.option)
        } else {
            None
        };
        if best.is_some_and(|best| option < best) {
            return false;
        }
        let identity = self.identity(node);
        if children
            .iter()
            .any(|child| self.identity(*child).same_span(&identity) && self.reaches(*child, node))
        {
            return false;
        }

        let known = self.packed.entry(node).or_default();
        if let SppfNode::Branch { alternatives, .. } = &mut self.nodes[node.index()] {
            if best.is_some_and(|best| option > best) {
                alternatives.clear();
                known.clear();
            }
            known.insert(children.clone());
            alternatives.push(PackedAlternative { option, children });
            self.revision += 1;
            return true;
        }
        false
    }

    /// Whether `target` is reachable from `from` through same-span children
    fn reaches(&self, from: NodeId, target: NodeId) -> bool {
        let span = self.identity(target);
        let mut visited: HashSet<NodeId, ahash::RandomState> = HashSet::default();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            for alternative in self.nodes[id.index()].alternatives() {
                stack.extend(
                    alternative
                        .children
                        .iter()
                        .copied()
                        .filter(|child| self.identity(*child).same_span(&span)),
                );
            }
        }
        false
    }

    /// Copy out the nodes reachable from `root`, renumbered with `root` first
    ///
    /// With `keep_unreachable` the remaining nodes follow in creation order.
    pub(crate) fn extract(&self, root: NodeId, keep_unreachable: bool) -> Vec<SppfNode> {
        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut order: Vec<NodeId> = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if remap[id.index()].is_some() {
                continue;
            }
            remap[id.index()] = Some(NodeId::new(order.len()));
            order.push(id);
            for alternative in self.nodes[id.index()].alternatives().iter().rev() {
                stack.extend(
                    alternative
                        .children
                        .iter()
                        .rev()
                        .copied()
                        .filter(|child| remap[child.index()].is_none()),
                );
            }
        }
        if keep_unreachable {
            for index in 0..self.nodes.len() {
                if remap[index].is_none() {
                    remap[index] = Some(NodeId::new(order.len()));
                    order.push(NodeId::new(index));
                }
            }
        }

        order
            .into_iter()
            .map(|id| match &self.nodes[id.index()] {
                SppfNode::Leaf { identity } => SppfNode::Leaf {
                    identity: *identity,
                },
                SppfNode::Branch {
                    identity,
                    alternatives,
                } => SppfNode::Branch {
                    identity: *identity,
                    alternatives: alternatives
                        .iter()
                        .map(|alternative| PackedAlternative {
                            option: alternative.option,
                            children: alternative
                                .children
                                .iter()
                                .filter_map(|child| remap[child.index()])
                                .collect(),
                        })
                        .collect(),
                },
            })
            .collect()
    }
}
