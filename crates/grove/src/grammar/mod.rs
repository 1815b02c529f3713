//! # Grammar Module
//!
//! The grammar rule model: namespaces, grammars with inheritance, rules and
//! skip rules, and the indexed right-hand-side item tree.
//!
//! ## Overview
//!
//! - **Rules** are declared through [`GrammarBuilder`] using [`Expr`]
//!   right-hand sides: concatenations, choices, priority choices,
//!   repetitions ([`Expr::multi`]) and separated lists.
//! - **Skip rules** (whitespace, comments) are tried implicitly after every
//!   terminal and never referenced by other rules.
//! - **Inheritance**: a grammar may extend other grammars. Lookups consult
//!   local rules first, then each parent in declared order.
//!
//! A built [`Grammar`] is immutable. Compiling it into a
//! [`RuntimeRuleSet`](crate::runtime::RuntimeRuleSet) happens once, on first
//! use, and the result is cached on the grammar.
//!
//! ## Usage
//!
//! ```rust
//! use grove::grammar::{Expr, GrammarBuilder};
//!
//! let grammar = GrammarBuilder::new("net.example", "Expressions")
//!     .rule(
//!         "e",
//!         Expr::priority_choice([
//!             Expr::non_terminal("variable"),
//!             Expr::non_terminal("multiply"),
//!             Expr::non_terminal("plus"),
//!         ]),
//!     )
//!     .rule("plus", Expr::concatenation([Expr::non_terminal("e"), Expr::literal("+"), Expr::non_terminal("e")]))
//!     .rule("multiply", Expr::concatenation([Expr::non_terminal("e"), Expr::literal("*"), Expr::non_terminal("e")]))
//!     .rule("variable", Expr::pattern("[a-z]"))
//!     .build()?;
//!
//! assert_eq!(grammar.find_all_terminal().len(), 3);
//! # Ok::<(), grove::error::GrammarError>(())
//! ```

mod builder;
mod expr;
pub mod item;
mod validate;

pub use builder::GrammarBuilder;
pub use expr::Expr;
pub use item::{ChoiceKind, ItemId, ItemPath, ItemRef, RuleItem, Terminal, TerminalKind};
pub use validate::validate_expr;

use crate::error::GrammarError;
use crate::runtime::RuntimeRuleSet;
use compact_str::CompactString;
use item::ItemArena;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Dotted qualified name a grammar lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(CompactString);

impl Namespace {
    #[must_use]
    pub fn new(qualified_name: impl Into<CompactString>) -> Self {
        Self(qualified_name.into())
    }

    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named production; skip rules are flagged with `is_skip`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: CompactString,
    index: usize,
    is_skip: bool,
    rhs: ItemId,
}

impl Rule {
    pub(crate) fn new(name: CompactString, index: usize, is_skip: bool, rhs: ItemId) -> Self {
        Self {
            name,
            index,
            is_skip,
            rhs,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the rule within its grammar
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        self.is_skip
    }

    /// Root [`RuleItem::Choice`] of the right-hand side
    #[must_use]
    pub const fn rhs(&self) -> ItemId {
        self.rhs
    }
}

/// A rule together with the grammar that declares it
#[derive(Debug, Clone, Copy)]
pub struct RuleRef<'g> {
    grammar: &'g Grammar,
    rule: &'g Rule,
}

impl<'g> RuleRef<'g> {
    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    #[must_use]
    pub const fn rule(&self) -> &'g Rule {
        self.rule
    }

    #[must_use]
    pub fn name(&self) -> &'g str {
        self.rule.name()
    }

    #[must_use]
    pub fn rhs(&self) -> ItemRef<'g> {
        ItemRef::new(self.grammar, self.rule.rhs())
    }
}

impl PartialEq for RuleRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.grammar, other.grammar) && self.rule.index == other.rule.index
    }
}

impl Eq for RuleRef<'_> {}

/// An immutable set of rules, optionally extending other grammars
pub struct Grammar {
    namespace: Namespace,
    name: CompactString,
    extends: Vec<Arc<Grammar>>,
    rules: Vec<Rule>,
    items: ItemArena,
    terminals: OnceCell<Vec<Terminal>>,
    runtime: OnceCell<Arc<RuntimeRuleSet>>,
}

impl Grammar {
    pub(crate) fn new(
        namespace: Namespace,
        name: CompactString,
        extends: Vec<Arc<Grammar>>,
        rules: Vec<Rule>,
        items: ItemArena,
    ) -> Self {
        Self {
            namespace,
            name,
            extends,
            rules,
            items,
            terminals: OnceCell::new(),
            runtime: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `namespace.name`
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Parent grammars in declared order
    #[must_use]
    pub fn extends(&self) -> &[Arc<Grammar>] {
        &self.extends
    }

    /// Rules declared by this grammar, in declaration order
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) const fn items(&self) -> &ItemArena {
        &self.items
    }

    #[must_use]
    pub fn rule_ref<'g>(&'g self, rule: &'g Rule) -> RuleRef<'g> {
        RuleRef {
            grammar: self,
            rule,
        }
    }

    #[must_use]
    pub fn item(&self, id: ItemId) -> ItemRef<'_> {
        ItemRef::new(self, id)
    }

    /// The single local rule called `name`
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::RuleNotFound`] unless exactly one local rule matches.
    pub fn find_rule(&self, name: &str) -> Result<&Rule, GrammarError> {
        let mut matches = self.rules.iter().filter(|rule| rule.name() == name);
        match (matches.next(), matches.count()) {
            (Some(rule), 0) => Ok(rule),
            (first, rest) => Err(GrammarError::rule_not_found(
                name,
                &self.qualified_name(),
                usize::from(first.is_some()) + rest,
            )),
        }
    }

    /// Resolve `name` locally, then through each parent in declared order
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::RuleNotFound`] if no grammar in the chain declares `name`.
    pub fn find_all_rule(&self, name: &str) -> Result<RuleRef<'_>, GrammarError> {
        self.lookup(name)
            .ok_or_else(|| GrammarError::rule_not_found(name, &self.qualified_name(), 0))
    }

    fn lookup(&self, name: &str) -> Option<RuleRef<'_>> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.name() == name) {
            return Some(self.rule_ref(rule));
        }
        self.extends.iter().find_map(|parent| parent.lookup(name))
    }

    /// Every rule visible from this grammar: local rules first, then
    /// inherited rules not overridden by a name declared earlier in the chain
    #[must_use]
    pub fn all_rules(&self) -> Vec<RuleRef<'_>> {
        let mut visible: Vec<RuleRef<'_>> = Vec::new();
        self.collect_visible(&mut visible);
        visible
    }

    fn collect_visible<'g>(&'g self, visible: &mut Vec<RuleRef<'g>>) {
        for rule in &self.rules {
            if !visible.iter().any(|seen| seen.name() == rule.name()) {
                visible.push(self.rule_ref(rule));
            }
        }
        for parent in &self.extends {
            parent.collect_visible(visible);
        }
    }

    /// Skip rules visible from this grammar, in lookup order
    #[must_use]
    pub fn all_skip_rules(&self) -> Vec<RuleRef<'_>> {
        self.all_rules()
            .into_iter()
            .filter(|rule| rule.rule().is_skip())
            .collect()
    }

    /// Every terminal reachable from any rule, this grammar first, then parents
    ///
    /// Deduplicated by kind and value in discovery order; the empty sentinel
    /// is included when some repetition allows zero items.
    pub fn find_all_terminal(&self) -> &[Terminal] {
        self.terminals.get_or_init(|| {
            let mut terminals = Vec::new();
            self.collect_terminals(&mut terminals);
            terminals
        })
    }

    fn collect_terminals(&self, terminals: &mut Vec<Terminal>) {
        for rule in &self.rules {
            self.collect_item_terminals(rule.rhs(), terminals);
        }
        for parent in &self.extends {
            for terminal in parent.find_all_terminal() {
                push_unique(terminals, terminal.clone());
            }
        }
    }

    fn collect_item_terminals(&self, id: ItemId, terminals: &mut Vec<Terminal>) {
        match self.items.get(id) {
            RuleItem::Choice { alternatives, .. } => {
                for alternative in alternatives {
                    self.collect_item_terminals(*alternative, terminals);
                }
            }
            RuleItem::Concatenation { items } => {
                for item in items {
                    self.collect_item_terminals(*item, terminals);
                }
            }
            RuleItem::Terminal(terminal) => push_unique(terminals, terminal.clone()),
            RuleItem::NonTerminal { .. } => {}
            RuleItem::Group { choice } => self.collect_item_terminals(*choice, terminals),
            RuleItem::Multi { min, item, .. } => {
                self.collect_item_terminals(*item, terminals);
                if *min == 0 {
                    push_unique(terminals, Terminal::empty());
                }
            }
            RuleItem::SeparatedList {
                min,
                item,
                separator,
                ..
            } => {
                self.collect_item_terminals(*item, terminals);
                self.collect_item_terminals(*separator, terminals);
                if *min == 0 {
                    push_unique(terminals, Terminal::empty());
                }
            }
        }
    }

    /// The compiled runtime rule set, built on first call and cached
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::RuleNotFound`] for unresolvable references and
    /// [`GrammarError::InvalidPattern`] for patterns that fail to compile.
    /// A failed compilation is not cached.
    pub fn runtime_rule_set(&self) -> Result<Arc<RuntimeRuleSet>, GrammarError> {
        self.runtime
            .get_or_try_init(|| crate::runtime::compile(self).map(Arc::new))
            .cloned()
    }
}

fn push_unique(terminals: &mut Vec<Terminal>, terminal: Terminal) {
    if !terminals.contains(&terminal) {
        terminals.push(terminal);
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("name", &self.qualified_name())
            .field(
                "extends",
                &self
                    .extends
                    .iter()
                    .map(|parent| parent.qualified_name())
                    .collect::<Vec<_>>(),
            )
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<Grammar> {
        GrammarBuilder::new("test", "Base")
            .skip_rule("WS", Expr::pattern(r"\s+"))
            .rule("value", Expr::choice([Expr::non_terminal("number"), Expr::literal("null")]))
            .rule("number", Expr::pattern("[0-9]+"))
            .build()
            .expect("valid base grammar")
    }

    fn derived(parent: Arc<Grammar>) -> Arc<Grammar> {
        GrammarBuilder::new("test", "Derived")
            .extends(parent)
            .rule("number", Expr::pattern("[0-9]+(\\.[0-9]+)?"))
            .rule("list", Expr::multi(0, None, Expr::non_terminal("value")))
            .build()
            .expect("valid derived grammar")
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(base().qualified_name(), "test.Base");
        assert_eq!(Namespace::from("a.b").qualified_name(), "a.b");
    }

    #[test]
    fn test_find_rule_local_only() {
        let grammar = derived(base());
        assert_eq!(grammar.find_rule("list").expect("list").name(), "list");
        let error = grammar.find_rule("value").expect_err("value is inherited");
        assert!(matches!(error, GrammarError::RuleNotFound { matches: 0, .. }));
    }

    #[test]
    fn test_find_all_rule_prefers_local() {
        let parent = base();
        let grammar = derived(parent.clone());

        let number = grammar.find_all_rule("number").expect("number");
        assert_eq!(number.grammar().qualified_name(), "test.Derived");

        let value = grammar.find_all_rule("value").expect("value");
        assert!(std::ptr::eq(value.grammar(), parent.as_ref()));
    }

    #[test]
    fn test_find_all_rule_missing() {
        let grammar = derived(base());
        let error = grammar.find_all_rule("nope").expect_err("no such rule");
        assert!(matches!(error, GrammarError::RuleNotFound { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_all_rules_respects_overrides() {
        let grammar = derived(base());
        let names: Vec<&str> = grammar.all_rules().iter().map(RuleRef::name).collect();
        assert_eq!(names, vec!["number", "list", "WS", "value"]);
        assert_eq!(grammar.all_skip_rules().len(), 1);
    }

    #[test]
    fn test_find_all_terminal_collects_through_extends() {
        let grammar = derived(base());
        let terminals = grammar.find_all_terminal();
        assert_eq!(
            terminals,
            &[
                Terminal::pattern("[0-9]+(\\.[0-9]+)?"),
                Terminal::empty(),
                Terminal::pattern(r"\s+"),
                Terminal::literal("null"),
                Terminal::pattern("[0-9]+"),
            ]
        );
        assert!(std::ptr::eq(terminals, grammar.find_all_terminal()));
    }
}
