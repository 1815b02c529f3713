//! # Runtime Rules
//!
//! A [`RuntimeRuleSet`] is the flat, integer-indexed form of a grammar that
//! the parser consumes. Compilation:
//!
//! - resolves every non-terminal reference to a [`RuleId`] through the
//!   grammar's inheritance chain,
//! - pre-compiles every terminal into a [`TerminalMatcher`] (terminals are
//!   shared by kind and value),
//! - lifts nested groups and repetitions into pseudo rules named
//!   `§owner§group0`, `§owner§multi0`, `§owner§sList0`.
//!
//! The set is immutable once built and is cached on its [`Grammar`], so
//! parses against different goals, or on different threads, share it.
//!
//! [`Grammar`]: crate::grammar::Grammar

mod compiler;
mod matcher;

pub(crate) use compiler::compile;
pub use matcher::TerminalMatcher;

use crate::error::GrammarError;
use crate::grammar::ChoiceKind;
use hashbrown::HashMap;
use lasso::{RodeoReader, Spur};
use smallvec::SmallVec;
use std::fmt;

/// Index of a rule in a [`RuntimeRuleSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(u32);

impl RuleId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Rule ids of one concatenation, in order
pub type Sequence = SmallVec<[RuleId; 4]>;

#[derive(Debug, Clone)]
pub enum RuntimeRuleKind {
    Terminal(TerminalMatcher),
    Concatenation(Sequence),
    Choice {
        kind: ChoiceKind,
        alternatives: Vec<Sequence>,
    },
    Multi {
        min: usize,
        max: Option<usize>,
        item: RuleId,
    },
    SeparatedList {
        min: usize,
        max: Option<usize>,
        item: RuleId,
        separator: RuleId,
    },
}

#[derive(Debug, Clone)]
pub struct RuntimeRule {
    id: RuleId,
    tag: Spur,
    kind: RuntimeRuleKind,
    is_skip: bool,
    is_pseudo: bool,
}

impl RuntimeRule {
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> &RuntimeRuleKind {
        &self.kind
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        self.is_skip
    }

    /// Generated for a nested group or repetition rather than declared
    #[must_use]
    pub const fn is_pseudo(&self) -> bool {
        self.is_pseudo
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.kind, RuntimeRuleKind::Terminal(_))
    }

    #[must_use]
    pub const fn matcher(&self) -> Option<&TerminalMatcher> {
        match &self.kind {
            RuntimeRuleKind::Terminal(matcher) => Some(matcher),
            _ => None,
        }
    }
}

/// Compiled, read-only rule table
#[derive(Debug)]
pub struct RuntimeRuleSet {
    grammar: String,
    rules: Vec<RuntimeRule>,
    names: RodeoReader,
    by_name: HashMap<Spur, RuleId, ahash::RandomState>,
    skip_rules: Vec<RuleId>,
    empty: RuleId,
}

impl RuntimeRuleSet {
    /// Qualified name of the grammar this set was compiled from
    #[must_use]
    pub fn grammar_name(&self) -> &str {
        &self.grammar
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this set.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> &RuntimeRule {
        &self.rules[id.index()]
    }

    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&RuntimeRule> {
        self.rules.get(id.index())
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuntimeRule> {
        self.rules.iter()
    }

    /// Id of the grammar rule called `name`, including inherited rules
    #[must_use]
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        let tag = self.names.get(name)?;
        self.by_name.get(&tag).copied()
    }

    /// Like [`rule_id`](Self::rule_id) but failing with [`GrammarError::RuleNotFound`]
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::RuleNotFound`] if no visible rule is called `name`.
    pub fn find(&self, name: &str) -> Result<RuleId, GrammarError> {
        self.rule_id(name)
            .ok_or_else(|| GrammarError::rule_not_found(name, &self.grammar, 0))
    }

    /// Rule name, terminal description (`'a'`, `"[0-9]+"`), or pseudo rule name
    #[must_use]
    pub fn name(&self, id: RuleId) -> &str {
        self.names.resolve(&self.rules[id.index()].tag)
    }

    /// Skip rules in lookup order
    #[must_use]
    pub fn skip_rules(&self) -> &[RuleId] {
        &self.skip_rules
    }

    /// The shared empty-terminal sentinel
    #[must_use]
    pub const fn empty_terminal(&self) -> RuleId {
        self.empty
    }

    pub fn terminals(&self) -> impl Iterator<Item = &RuntimeRule> {
        self.rules.iter().filter(|rule| rule.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Expr, GrammarBuilder};

    #[test]
    fn test_rule_id_roundtrip() {
        let id = RuleId::new(12);
        assert_eq!(id.index(), 12);
        assert_eq!(id.to_string(), "#12");
    }

    #[test]
    fn test_rule_set_is_cached_per_grammar() {
        let grammar = GrammarBuilder::new("test", "Cache")
            .rule("a", Expr::literal("a"))
            .build()
            .expect("valid grammar");

        let first = grammar.runtime_rule_set().expect("compiles");
        let second = grammar.runtime_rule_set().expect("compiles");
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_rule_set_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuntimeRuleSet>();
    }
}
