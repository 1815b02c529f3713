//! # Growth Engine
//!
//! Top-down derivation with a memo keyed by `(rule, start, skipping)`.
//!
//! Every memo entry records the ends reached so far. While an entry is being
//! computed it is *growing*; re-entering it (left recursion, directly or
//! through other rules) returns the ends from earlier passes and marks the
//! entry as a recursion head. A head recomputes its derivation until a pass
//! leaves the forest unchanged.
//!
//! Entries computed while depending on a head deeper in the stack are
//! *stale*: they are reused for the rest of the head's current pass and
//! recomputed in its next one. Entries that only depend on themselves are
//! *complete* and never recomputed.

use crate::error::{ParseError, ParseFailed, ParseMetrics};
use crate::parser::ParserConfig;
use crate::runtime::{RuleId, RuntimeRuleKind, RuntimeRuleSet, TerminalMatcher};
use crate::sppf::forest::Forest;
use crate::sppf::{Children, NodeId, NodeIdentity, SharedPackedParseTree, TextRange, TextSize};
use hashbrown::{HashMap, HashSet};
use smallvec::{smallvec, SmallVec};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

/// Marker reported when the input continues past the longest match
const END_OF_TEXT: &str = "<EOT>";

type Ends = SmallVec<[(usize, NodeId); 2]>;

/// Ends in the order they were reached, each reported once
#[derive(Debug, Default)]
struct EndSet {
    ends: Ends,
    reached: HashSet<usize, ahash::RandomState>,
}

impl EndSet {
    fn from_ends(ends: Ends) -> Self {
        let reached = ends.iter().map(|(end, _)| *end).collect();
        Self { ends, reached }
    }

    fn contains(&self, end: usize) -> bool {
        self.reached.contains(&end)
    }

    fn insert(&mut self, end: usize, node: NodeId) {
        if self.reached.insert(end) {
            self.ends.push((end, node));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemoKey {
    rule: RuleId,
    start: usize,
    skipping: bool,
}

#[derive(Debug, Clone, Copy)]
enum EntryState {
    Growing { depth: usize },
    /// Valid while `generation` is current; depends on the entry at `dep`
    Stale { generation: u64, dep: usize },
    Complete,
}

#[derive(Debug)]
struct MemoEntry {
    state: EntryState,
    ends: Ends,
    left_recursive: bool,
}

/// One way an item can follow at a position: the nodes it contributes to the
/// enclosing child list, including trailing skip
#[derive(Debug, Clone)]
struct Chunk {
    end: usize,
    nodes: Children,
}

pub(crate) struct Engine<'p> {
    rules: &'p Arc<RuntimeRuleSet>,
    input: &'p Arc<str>,
    config: &'p ParserConfig,
    forest: Forest,
    memo: HashMap<MemoKey, MemoEntry, ahash::RandomState>,
    skip_memo: HashMap<usize, (usize, Children), ahash::RandomState>,
    /// Lowest stack depth each active entry depends on, one slot per entry
    deps: Vec<usize>,
    generation: u64,
    furthest_failure: Option<usize>,
    expected: Vec<RuleId>,
    metrics: ParseMetrics,
}

impl<'p> Engine<'p> {
    pub(crate) fn new(
        rules: &'p Arc<RuntimeRuleSet>,
        input: &'p Arc<str>,
        config: &'p ParserConfig,
    ) -> Self {
        Self {
            rules,
            input,
            config,
            forest: Forest::new(),
            memo: HashMap::default(),
            skip_memo: HashMap::default(),
            deps: Vec::new(),
            generation: 0,
            furthest_failure: None,
            expected: Vec::new(),
            metrics: ParseMetrics::default(),
        }
    }

    /// Derive `goal` over the whole input
    pub(crate) fn run(mut self, goal: RuleId) -> Result<SharedPackedParseTree, ParseError> {
        let started = Instant::now();
        let len = self.input.len();

        let (offset, lead) = if self.rules.skip_rules().is_empty() {
            (0, Children::new())
        } else {
            self.skip_run(0)?
        };
        let ends = self.derive(goal, offset, false)?;

        self.metrics.nodes_created = self.forest.len();
        self.metrics.parse_time = started.elapsed();

        if let Some((_, node)) = ends.iter().find(|(end, _)| *end == len) {
            let root = self.wrap_leading_skip(*node, &lead);
            log::debug!(
                "parsed '{}' over {len} bytes: {} steps, {} nodes, {} growth passes",
                self.rules.name(goal),
                self.metrics.steps,
                self.metrics.nodes_created,
                self.metrics.growth_passes
            );
            return Ok(self.freeze(root));
        }

        Err(self.failure(goal, offset, &lead).into())
    }

    fn freeze(&self, root: NodeId) -> SharedPackedParseTree {
        let nodes = self.forest.extract(root, !self.config.compact_forest);
        SharedPackedParseTree::new(
            Arc::clone(self.input),
            Arc::clone(self.rules),
            nodes,
            self.metrics.clone(),
        )
    }

    /// Re-root `node` at offset 0 with the leading skip prepended to each
    /// of its alternatives
    fn wrap_leading_skip(&mut self, node: NodeId, lead: &Children) -> NodeId {
        if lead.is_empty() {
            return node;
        }
        let identity = self.forest.identity(node);
        let root = self
            .forest
            .branch(NodeIdentity::new(identity.rule, 0, identity.end));
        let alternatives = self.forest.get(node).alternatives().to_vec();
        if alternatives.is_empty() {
            let children: Children = lead.iter().copied().chain(std::iter::once(node)).collect();
            self.forest.add_alternative(root, 0, children, false);
        }
        for alternative in alternatives {
            let children: Children = lead
                .iter()
                .copied()
                .chain(alternative.children.iter().copied())
                .collect();
            self.forest.add_alternative(root, alternative.option, children, false);
        }
        root
    }

    fn failure(&mut self, goal: RuleId, offset: usize, lead: &Children) -> ParseFailed {
        let rules = self.rules;
        let longest = self
            .forest
            .nodes()
            .filter(|(_, node)| !node.is_leaf() && !node.alternatives().is_empty())
            .map(|(id, node)| (id, node.identity()))
            .filter(|(_, identity)| identity.start == offset && !rules.rule(identity.rule).is_skip())
            .max_by_key(|(_, identity)| {
                (identity.end, identity.rule == goal, Reverse(identity.rule))
            })
            .map(|(id, _)| id);

        let reached = longest.map_or(offset, |id| self.forest.identity(id).end);
        let (failure_offset, expected) = match self.furthest_failure {
            Some(furthest) if furthest >= reached => (
                furthest,
                self.expected
                    .iter()
                    .map(|id| rules.name(*id).to_string())
                    .collect(),
            ),
            _ => (reached, vec![END_OF_TEXT.to_string()]),
        };
        let expected = if self.config.collect_expected {
            expected
        } else {
            Vec::new()
        };

        let longest_match = longest.map(|node| {
            let root = self.wrap_leading_skip(node, lead);
            self.freeze(root)
        });
        let span = longest_match
            .as_ref()
            .map_or_else(|| TextRange::empty(TextSize::of(offset)), |tree| tree.root().range());

        log::debug!(
            "parse of '{}' failed: longest match {span}, failure at {failure_offset}",
            rules.name(goal)
        );

        ParseFailed {
            goal: rules.name(goal).to_string(),
            span,
            failure_offset: TextSize::of(failure_offset),
            expected,
            longest_match,
        }
    }

    fn step(&mut self) -> Result<(), ParseError> {
        self.metrics.steps += 1;
        match self.config.max_steps {
            Some(limit) if self.metrics.steps > limit => Err(ParseError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    /// Every end `rule` reaches from `start`, with the node spanning it
    fn derive(&mut self, rule: RuleId, start: usize, skipping: bool) -> Result<Ends, ParseError> {
        let key = MemoKey {
            rule,
            start,
            skipping,
        };

        if let Some(entry) = self.memo.get_mut(&key) {
            match entry.state {
                EntryState::Complete => {
                    self.metrics.memo_hits += 1;
                    return Ok(entry.ends.clone());
                }
                EntryState::Growing { depth } => {
                    entry.left_recursive = true;
                    let ends = entry.ends.clone();
                    self.depend_on(depth);
                    return Ok(ends);
                }
                EntryState::Stale { generation, dep } if generation == self.generation => {
                    self.metrics.memo_hits += 1;
                    let ends = entry.ends.clone();
                    self.depend_on(dep);
                    return Ok(ends);
                }
                EntryState::Stale { .. } => {}
            }
        }

        let depth = self.deps.len();
        if let Some(limit) = self.config.max_depth {
            if depth >= limit {
                return Err(ParseError::DepthLimitExceeded { limit });
            }
        }

        let entry = self.memo.entry(key).or_insert_with(|| MemoEntry {
            state: EntryState::Complete,
            ends: Ends::new(),
            left_recursive: false,
        });
        entry.state = EntryState::Growing { depth };
        entry.left_recursive = false;
        self.deps.push(usize::MAX);

        let mut pass = 0usize;
        let ends = loop {
            let revision = self.forest.revision();
            let found = match self.expand(rule, start, skipping) {
                Ok(found) => found,
                Err(error) => {
                    self.deps.pop();
                    return Err(error);
                }
            };

            let Some(entry) = self.memo.get_mut(&key) else {
                break Ends::new();
            };
            let mut merged = EndSet::from_ends(std::mem::take(&mut entry.ends));
            for (end, node) in found {
                merged.insert(end, node);
            }
            entry.ends = merged.ends;
            if !entry.left_recursive {
                break entry.ends.clone();
            }

            self.generation += 1;
            if self.forest.revision() == revision {
                break entry.ends.clone();
            }
            pass += 1;
            self.metrics.growth_passes += 1;
            log::trace!(
                "growing '{}' at {start}: pass {pass}, {} ends",
                self.rules.name(rule),
                entry.ends.len()
            );
        };

        let dep = self.deps.pop().unwrap_or(usize::MAX);
        let state = if dep < depth {
            self.depend_on(dep);
            EntryState::Stale {
                generation: self.generation,
                dep,
            }
        } else {
            EntryState::Complete
        };
        if let Some(entry) = self.memo.get_mut(&key) {
            entry.state = state;
        }
        Ok(ends)
    }

    fn depend_on(&mut self, depth: usize) {
        if let Some(top) = self.deps.last_mut() {
            *top = (*top).min(depth);
        }
    }

    /// One pass over the definition of `rule`
    fn expand(&mut self, id: RuleId, start: usize, skipping: bool) -> Result<Ends, ParseError> {
        let rules = self.rules;
        let mut ends = EndSet::default();

        match rules.rule(id).kind() {
            RuntimeRuleKind::Terminal(matcher) => {
                if let Some(end) = self.match_terminal(id, matcher, start, skipping) {
                    let leaf = self.forest.leaf(NodeIdentity::new(id, start, end));
                    ends.insert(end, leaf);
                }
            }
            RuntimeRuleKind::Concatenation(items) => {
                for (end, children) in self.derive_sequence(items, start, skipping)? {
                    self.record(&mut ends, id, start, end, 0, children, false);
                }
            }
            RuntimeRuleKind::Choice { kind, alternatives } => {
                let priority = kind.is_priority();
                for (option, items) in alternatives.iter().enumerate() {
                    for (end, children) in self.derive_sequence(items, start, skipping)? {
                        self.record(&mut ends, id, start, end, option, children, priority);
                    }
                }
            }
            RuntimeRuleKind::Multi { min, max, item } => {
                for (end, children) in self.derive_repetition(*min, *max, *item, None, start, skipping)? {
                    self.record(&mut ends, id, start, end, 0, children, false);
                }
            }
            RuntimeRuleKind::SeparatedList {
                min,
                max,
                item,
                separator,
            } => {
                let found =
                    self.derive_repetition(*min, *max, *item, Some(*separator), start, skipping)?;
                for (end, children) in found {
                    self.record(&mut ends, id, start, end, 0, children, false);
                }
            }
        }
        Ok(ends.ends)
    }

    /// Add a derivation of `(rule, start, end)`; the end is reported only if
    /// the node holds at least one alternative afterwards
    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        ends: &mut EndSet,
        rule: RuleId,
        start: usize,
        end: usize,
        option: usize,
        children: Children,
        priority: bool,
    ) {
        let node = self.forest.branch(NodeIdentity::new(rule, start, end));
        self.forest.add_alternative(node, option, children, priority);
        if !ends.contains(end) && !self.forest.get(node).alternatives().is_empty() {
            ends.insert(end, node);
        }
    }

    fn match_terminal(
        &mut self,
        id: RuleId,
        matcher: &TerminalMatcher,
        start: usize,
        skipping: bool,
    ) -> Option<usize> {
        let end = matcher.match_at(self.input, start);
        if end.is_none() && !skipping {
            self.note_failure(id, start);
        }
        end
    }

    fn note_failure(&mut self, terminal: RuleId, offset: usize) {
        match self.furthest_failure {
            Some(furthest) if offset < furthest => return,
            Some(furthest) if offset == furthest => {}
            _ => {
                self.furthest_failure = Some(offset);
                self.expected.clear();
            }
        }
        if self.config.collect_expected && !self.expected.contains(&terminal) {
            self.expected.push(terminal);
        }
    }

    /// Every way `item` can follow at `start`
    fn derive_item(&mut self, item: RuleId, start: usize, skipping: bool) -> Result<Vec<Chunk>, ParseError> {
        self.step()?;
        let rules = self.rules;

        let Some(matcher) = rules.rule(item).matcher() else {
            let ends = self.derive(item, start, skipping)?;
            return Ok(ends
                .into_iter()
                .map(|(end, node)| Chunk {
                    end,
                    nodes: smallvec![node],
                })
                .collect());
        };

        let Some(end) = self.match_terminal(item, matcher, start, skipping) else {
            return Ok(Vec::new());
        };
        let leaf = self.forest.leaf(NodeIdentity::new(item, start, end));
        if skipping || matcher.is_empty() || rules.skip_rules().is_empty() {
            return Ok(vec![Chunk {
                end,
                nodes: smallvec![leaf],
            }]);
        }

        let (after, skipped) = self.skip_run(end)?;
        let mut nodes: Children = smallvec![leaf];
        nodes.extend(skipped);
        Ok(vec![Chunk { end: after, nodes }])
    }

    /// Child lists of `items` in sequence, one per distinct way through
    fn derive_sequence(
        &mut self,
        items: &[RuleId],
        start: usize,
        skipping: bool,
    ) -> Result<Vec<(usize, Children)>, ParseError> {
        let mut states: Vec<(usize, Children)> = vec![(start, Children::new())];
        for item in items {
            states = self.extend_all(&states, *item, true, skipping)?;
            if states.is_empty() {
                break;
            }
        }
        Ok(states)
    }

    /// Child lists for every repetition count in `min..=max`
    ///
    /// Unseparated zero-width items are only taken while fewer than `min`
    /// have been matched. A count of zero yields the empty leaf.
    fn derive_repetition(
        &mut self,
        min: usize,
        max: Option<usize>,
        item: RuleId,
        separator: Option<RuleId>,
        start: usize,
        skipping: bool,
    ) -> Result<Vec<(usize, Children)>, ParseError> {
        let mut found = Vec::new();
        if min == 0 {
            let empty = self.rules.empty_terminal();
            let leaf = self.forest.leaf(NodeIdentity::new(empty, start, start));
            found.push((start, smallvec![leaf]));
        }

        let mut frontier: Vec<(usize, Children)> = vec![(start, Children::new())];
        let mut count = 0usize;
        while !frontier.is_empty() && max.map_or(true, |max| count < max) {
            // A separator always consumes input, so an empty item after one
            // still makes progress.
            let (heads, allow_empty) = match separator {
                Some(separator) if count > 0 => {
                    (self.extend_all(&frontier, separator, true, skipping)?, true)
                }
                _ => (frontier, count < min),
            };
            let next = self.extend_all(&heads, item, allow_empty, skipping)?;
            count += 1;
            if count >= min {
                found.extend(next.iter().cloned());
            }
            frontier = next;
        }
        Ok(found)
    }

    /// Follow every state with `item`
    ///
    /// The item is derived once per distinct position and states that end
    /// with the same child list are merged.
    fn extend_all(
        &mut self,
        states: &[(usize, Children)],
        item: RuleId,
        allow_empty: bool,
        skipping: bool,
    ) -> Result<Vec<(usize, Children)>, ParseError> {
        let mut chunks: HashMap<usize, Vec<Chunk>, ahash::RandomState> = HashMap::default();
        let mut seen: HashSet<(usize, Children), ahash::RandomState> = HashSet::default();
        let mut next = Vec::new();
        for (position, children) in states {
            if !chunks.contains_key(position) {
                let derived = self.derive_item(item, *position, skipping)?;
                chunks.insert(*position, derived);
            }
            for chunk in chunks.get(position).into_iter().flatten() {
                if chunk.end == *position && !allow_empty {
                    continue;
                }
                let mut extended = children.clone();
                extended.extend(chunk.nodes.iter().copied());
                if seen.insert((chunk.end, extended.clone())) {
                    next.push((chunk.end, extended));
                }
            }
        }
        Ok(next)
    }

    /// Skip derivations starting at `start`, longest match first, until
    /// none applies
    fn skip_run(&mut self, start: usize) -> Result<(usize, Children), ParseError> {
        if let Some(run) = self.skip_memo.get(&start) {
            return Ok(run.clone());
        }

        let rules = self.rules;
        let mut position = start;
        let mut nodes = Children::new();
        loop {
            let mut best: Option<(usize, NodeId)> = None;
            for skip in rules.skip_rules() {
                for (end, node) in self.derive(*skip, position, true)? {
                    if end > position && best.map_or(true, |(longest, _)| end > longest) {
                        best = Some((end, node));
                    }
                }
            }
            match best {
                Some((end, node)) => {
                    nodes.push(node);
                    position = end;
                }
                None => break,
            }
        }

        self.skip_memo.insert(start, (position, nodes.clone()));
        Ok((position, nodes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder};

    fn run(grammar: &Arc<crate::grammar::Grammar>, goal: &str, text: &str) -> Result<SharedPackedParseTree, ParseError> {
        let rules = grammar.runtime_rule_set().expect("compiles");
        let input: Arc<str> = Arc::from(text);
        let config = ParserConfig::default();
        let goal = rules.find(goal).expect("goal exists");
        Engine::new(&rules, &input, &config).run(goal)
    }

    #[test]
    fn test_memo_reuses_shared_prefix() {
        let grammar = GrammarBuilder::new("test", "Shared")
            .rule(
                "s",
                Expr::choice([
                    Expr::concatenation([Expr::non_terminal("x"), Expr::literal("b")]),
                    Expr::concatenation([Expr::non_terminal("x"), Expr::literal("c")]),
                ]),
            )
            .rule("x", Expr::literal("a"))
            .build()
            .expect("valid grammar");
        let tree = run(&grammar, "s", "ac").expect("parses");
        assert_eq!(tree.to_string(), "s{x{'a'} 'c'}");
        assert!(tree.metrics().memo_hits >= 1);
    }

    #[test]
    fn test_direct_left_recursion_grows() {
        let grammar = GrammarBuilder::new("test", "Left")
            .rule(
                "S",
                Expr::choice([
                    Expr::concatenation([Expr::non_terminal("S"), Expr::literal("a")]),
                    Expr::literal("a"),
                ]),
            )
            .build()
            .expect("valid grammar");
        let tree = run(&grammar, "S", "aaa").expect("parses");
        assert_eq!(tree.to_string(), "S{S{S{'a'} 'a'} 'a'}");
        assert!(tree.metrics().growth_passes >= 2);
    }

    #[test]
    fn test_indirect_left_recursion_grows() {
        let grammar = GrammarBuilder::new("test", "Indirect")
            .rule(
                "A",
                Expr::choice([Expr::non_terminal("B"), Expr::literal("a")]),
            )
            .rule(
                "B",
                Expr::concatenation([Expr::non_terminal("A"), Expr::literal("b")]),
            )
            .build()
            .expect("valid grammar");
        let tree = run(&grammar, "A", "abb").expect("parses");
        assert_eq!(tree.to_string(), "A{B{A{B{A{'a'} 'b'}} 'b'}}");
    }

    #[test]
    fn test_unit_cycle_terminates() {
        let grammar = GrammarBuilder::new("test", "Cycle")
            .rule(
                "A",
                Expr::choice([Expr::non_terminal("B"), Expr::literal("a")]),
            )
            .rule("B", Expr::non_terminal("A"))
            .build()
            .expect("valid grammar");
        let tree = run(&grammar, "A", "a").expect("parses");
        assert_eq!(tree.count_trees(), 1);
        assert_eq!(tree.to_string(), "A{'a'}");
    }

    #[test]
    fn test_furthest_failure_collects_expected() {
        let grammar = GrammarBuilder::new("test", "Expect")
            .rule(
                "s",
                Expr::concatenation([
                    Expr::literal("a"),
                    Expr::choice([Expr::literal("b"), Expr::literal("c")]),
                ]),
            )
            .build()
            .expect("valid grammar");
        let error = run(&grammar, "s", "ad").expect_err("no match");
        let failed = error.as_failed().expect("parse failure");
        assert_eq!(failed.failure_offset, TextSize::of(1));
        assert_eq!(failed.expected, vec!["'b'".to_string(), "'c'".to_string()]);
        assert!(failed.longest_match.is_none());
    }

    #[test]
    fn test_step_limit() {
        let grammar = GrammarBuilder::new("test", "Limit")
            .rule("as", Expr::multi(0, None, Expr::literal("a")))
            .build()
            .expect("valid grammar");
        let rules = grammar.runtime_rule_set().expect("compiles");
        let input: Arc<str> = Arc::from("aaaaaaaaaa");
        let config = ParserConfig::default().with_max_steps(3);
        let goal = rules.find("as").expect("goal");
        let result = Engine::new(&rules, &input, &config).run(goal);
        assert!(matches!(result, Err(ParseError::StepLimitExceeded { limit: 3 })));
    }

    #[test]
    fn test_depth_limit() {
        let grammar = GrammarBuilder::new("test", "Deep")
            .rule(
                "r",
                Expr::choice([
                    Expr::concatenation([Expr::literal("("), Expr::non_terminal("r"), Expr::literal(")")]),
                    Expr::literal("x"),
                ]),
            )
            .build()
            .expect("valid grammar");
        let rules = grammar.runtime_rule_set().expect("compiles");
        let input: Arc<str> = Arc::from("((((((x))))))");
        let config = ParserConfig::default().with_max_depth(4);
        let goal = rules.find("r").expect("goal");
        let result = Engine::new(&rules, &input, &config).run(goal);
        assert!(matches!(result, Err(ParseError::DepthLimitExceeded { limit: 4 })));
    }
}
