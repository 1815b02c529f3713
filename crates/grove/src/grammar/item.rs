//! Arena storage for rule right-hand sides.
//!
//! Every rule's right-hand side is indexed once, at build time, into a flat
//! arena of [`RuleItem`]s owned by the grammar. Items refer to each other by
//! [`ItemId`]; the owning rule and position of each item live in a side
//! index of [`ItemPath`]s, so items carry no back-pointers.

use crate::grammar::{Grammar, Rule};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of an item in its grammar's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u32);

impl ItemId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a choice treats alternatives that succeed over the same span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChoiceKind {
    /// Keep every successful alternative
    #[default]
    Simple,
    /// Keep only the highest-ranked alternative.
    ///
    /// Alternatives are listed in `<` order, lowest rank first: in
    /// `e ::= variable < multiply < plus`, `plus` outranks `multiply`.
    Priority,
}

impl ChoiceKind {
    #[must_use]
    pub const fn is_priority(self) -> bool {
        matches!(self, Self::Priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Literal,
    Pattern,
    /// Zero-width sentinel standing for an empty repetition
    Empty,
}

/// A literal or regular-expression terminal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Terminal {
    kind: TerminalKind,
    value: CompactString,
}

impl Terminal {
    /// Display name of the empty sentinel
    pub const EMPTY_NAME: &'static str = "<EMPTY>";

    #[must_use]
    pub fn literal(value: impl Into<CompactString>) -> Self {
        Self {
            kind: TerminalKind::Literal,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn pattern(value: impl Into<CompactString>) -> Self {
        Self {
            kind: TerminalKind::Pattern,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: TerminalKind::Empty,
            value: CompactString::default(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TerminalKind {
        self.kind
    }

    /// Literal text or pattern source
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn is_empty_sentinel(&self) -> bool {
        self.kind == TerminalKind::Empty
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TerminalKind::Literal => write!(f, "'{}'", self.value),
            TerminalKind::Pattern => write!(f, "\"{}\"", self.value),
            TerminalKind::Empty => f.write_str(Self::EMPTY_NAME),
        }
    }
}

/// One node of an indexed right-hand side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleItem {
    /// Ordered alternatives, each a [`RuleItem::Concatenation`]
    Choice {
        kind: ChoiceKind,
        alternatives: Vec<ItemId>,
    },
    /// Non-empty ordered list of items
    Concatenation { items: Vec<ItemId> },
    Terminal(Terminal),
    /// Reference to a rule by name, resolved at compile time
    NonTerminal { name: CompactString },
    /// Parenthesised choice used as a single item
    Group { choice: ItemId },
    /// `item` repeated between `min` and `max` times (`None` is unbounded)
    Multi {
        min: usize,
        max: Option<usize>,
        item: ItemId,
    },
    /// `item (separator item)*` with between `min` and `max` items
    SeparatedList {
        min: usize,
        max: Option<usize>,
        separator: ItemId,
        item: ItemId,
    },
}

/// Stable identity of an item: owning rule plus child positions from the root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemPath {
    rule: usize,
    steps: SmallVec<[u32; 6]>,
}

impl ItemPath {
    pub(crate) fn root(rule: usize) -> Self {
        Self {
            rule,
            steps: SmallVec::new(),
        }
    }

    pub(crate) fn child(&self, position: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(u32::try_from(position).unwrap_or(u32::MAX));
        Self {
            rule: self.rule,
            steps,
        }
    }

    /// Index of the owning rule within its grammar
    #[must_use]
    pub const fn rule_index(&self) -> usize {
        self.rule
    }

    #[must_use]
    pub fn steps(&self) -> &[u32] {
        &self.steps
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rule)?;
        for step in &self.steps {
            write!(f, ".{step}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ItemArena {
    items: Vec<RuleItem>,
    paths: Vec<ItemPath>,
}

impl ItemArena {
    pub(crate) fn alloc(&mut self, item: RuleItem, path: ItemPath) -> ItemId {
        let id = ItemId(u32::try_from(self.items.len()).unwrap_or(u32::MAX));
        self.items.push(item);
        self.paths.push(path);
        id
    }

    pub(crate) fn get(&self, id: ItemId) -> &RuleItem {
        &self.items[id.index()]
    }

    pub(crate) fn path(&self, id: ItemId) -> &ItemPath {
        &self.paths[id.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// An item together with the grammar that owns it
#[derive(Clone, Copy)]
pub struct ItemRef<'g> {
    grammar: &'g Grammar,
    id: ItemId,
}

impl<'g> ItemRef<'g> {
    pub(crate) const fn new(grammar: &'g Grammar, id: ItemId) -> Self {
        Self { grammar, id }
    }

    #[must_use]
    pub const fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    #[must_use]
    pub fn item(&self) -> &'g RuleItem {
        self.grammar.items().get(self.id)
    }

    #[must_use]
    pub fn path(&self) -> &'g ItemPath {
        self.grammar.items().path(self.id)
    }

    #[must_use]
    pub fn owning_rule(&self) -> &'g Rule {
        &self.grammar.rules()[self.path().rule_index()]
    }

    /// Direct children in declaration order
    #[must_use]
    pub fn children(&self) -> Vec<ItemRef<'g>> {
        let ids: Vec<ItemId> = match self.item() {
            RuleItem::Choice { alternatives, .. } => alternatives.clone(),
            RuleItem::Concatenation { items } => items.clone(),
            RuleItem::Terminal(_) | RuleItem::NonTerminal { .. } => Vec::new(),
            RuleItem::Group { choice } => vec![*choice],
            RuleItem::Multi { item, .. } => vec![*item],
            RuleItem::SeparatedList {
                item, separator, ..
            } => vec![*item, *separator],
        };
        ids.into_iter()
            .map(|id| ItemRef::new(self.grammar, id))
            .collect()
    }
}

impl PartialEq for ItemRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.grammar, other.grammar) && self.path() == other.path()
    }
}

impl Eq for ItemRef<'_> {}

impl Hash for ItemRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl fmt::Debug for ItemRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRef")
            .field("rule", &self.owning_rule().name())
            .field("path", &format_args!("{}", self.path()))
            .field("item", self.item())
            .finish()
    }
}
