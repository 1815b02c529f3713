use crate::error::GrammarError;
use crate::grammar::item::{ChoiceKind, ItemArena, ItemId, ItemPath, RuleItem, Terminal};
use crate::grammar::validate::{check_unique_names, validate_expr};
use crate::grammar::{Expr, Grammar, Namespace, Rule};
use compact_str::CompactString;
use std::sync::Arc;

struct PendingRule {
    name: CompactString,
    is_skip: bool,
    rhs: Expr,
}

/// Builder for [`Grammar`]
///
/// Rules are collected as [`Expr`]s and only indexed when [`build`] is
/// called, so the resulting grammar never exposes a half-built rule.
///
/// # Example
///
/// ```rust
/// use grove::grammar::{Expr, GrammarBuilder};
///
/// let grammar = GrammarBuilder::new("test", "Lists")
///     .skip_rule("WS", Expr::pattern(r"\s+"))
///     .rule("list", Expr::separated_list(1, None, ",", Expr::non_terminal("item")))
///     .rule("item", Expr::pattern("[a-z]+"))
///     .build()
///     .expect("valid grammar");
///
/// assert_eq!(grammar.qualified_name(), "test.Lists");
/// assert!(grammar.find_rule("item").is_ok());
/// ```
///
/// [`build`]: GrammarBuilder::build
pub struct GrammarBuilder {
    namespace: Namespace,
    name: CompactString,
    extends: Vec<Arc<Grammar>>,
    rules: Vec<PendingRule>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(namespace: impl Into<Namespace>, name: impl Into<CompactString>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            extends: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Inherit the rules of `parent`; parents are consulted in the order added
    #[must_use]
    pub fn extends(mut self, parent: Arc<Grammar>) -> Self {
        self.extends.push(parent);
        self
    }

    /// Declare a rule
    ///
    /// `rhs` is a choice, priority choice, concatenation, repetition, or a
    /// single item (treated as a one-item concatenation).
    #[must_use]
    pub fn rule(mut self, name: impl Into<CompactString>, rhs: Expr) -> Self {
        self.rules.push(PendingRule {
            name: name.into(),
            is_skip: false,
            rhs,
        });
        self
    }

    /// Declare a skip rule, tried implicitly after every terminal
    #[must_use]
    pub fn skip_rule(mut self, name: impl Into<CompactString>, rhs: Expr) -> Self {
        self.rules.push(PendingRule {
            name: name.into(),
            is_skip: true,
            rhs,
        });
        self
    }

    /// Validate and index every rule
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError`] if two rules share a name or a right-hand
    /// side is malformed. References to undefined rules are reported when
    /// the grammar is compiled, since they may resolve through `extends`.
    pub fn build(self) -> Result<Arc<Grammar>, GrammarError> {
        let qualified = format!("{}.{}", self.namespace, self.name);
        check_unique_names(&qualified, self.rules.iter().map(|rule| &rule.name))?;
        for rule in &self.rules {
            validate_expr(&rule.name, &rule.rhs)?;
        }

        let mut arena = ItemArena::default();
        let rules = self
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, pending)| {
                let rhs = index_rhs(&mut arena, ItemPath::root(index), pending.rhs);
                Rule::new(pending.name, index, pending.is_skip, rhs)
            })
            .collect::<Vec<_>>();

        log::debug!(
            "built grammar {qualified}: {} rules, {} items",
            rules.len(),
            arena.len()
        );

        Ok(Arc::new(Grammar::new(
            self.namespace,
            self.name,
            self.extends,
            rules,
            arena,
        )))
    }
}

fn index_rhs(arena: &mut ItemArena, path: ItemPath, rhs: Expr) -> ItemId {
    match rhs {
        Expr::Choice(alternatives) => index_choice(arena, path, ChoiceKind::Simple, alternatives),
        Expr::PriorityChoice(alternatives) => {
            index_choice(arena, path, ChoiceKind::Priority, alternatives)
        }
        other => index_choice(arena, path, ChoiceKind::Simple, vec![other]),
    }
}

fn index_choice(
    arena: &mut ItemArena,
    path: ItemPath,
    kind: ChoiceKind,
    alternatives: Vec<Expr>,
) -> ItemId {
    let alternatives = alternatives
        .into_iter()
        .enumerate()
        .map(|(position, alternative)| index_concatenation(arena, path.child(position), alternative))
        .collect();
    arena.alloc(RuleItem::Choice { kind, alternatives }, path)
}

fn index_concatenation(arena: &mut ItemArena, path: ItemPath, expr: Expr) -> ItemId {
    let items = match expr {
        Expr::Concatenation(items) => items,
        other => vec![other],
    };
    let items = items
        .into_iter()
        .enumerate()
        .map(|(position, item)| index_item(arena, path.child(position), item))
        .collect();
    arena.alloc(RuleItem::Concatenation { items }, path)
}

fn index_item(arena: &mut ItemArena, path: ItemPath, expr: Expr) -> ItemId {
    let item = match expr {
        Expr::Literal(text) => RuleItem::Terminal(Terminal::literal(text)),
        Expr::Pattern(source) => RuleItem::Terminal(Terminal::pattern(source)),
        Expr::NonTerminal(name) => RuleItem::NonTerminal { name },
        Expr::Group(inner) => RuleItem::Group {
            choice: index_rhs(arena, path.child(0), *inner),
        },
        // a bare choice or concatenation inside a concatenation is an implicit group
        nested @ (Expr::Choice(_) | Expr::PriorityChoice(_) | Expr::Concatenation(_)) => {
            RuleItem::Group {
                choice: index_rhs(arena, path.child(0), nested),
            }
        }
        Expr::Multi { item, min, max } => RuleItem::Multi {
            min,
            max,
            item: index_item(arena, path.child(0), *item),
        },
        Expr::SeparatedList {
            item,
            separator,
            min,
            max,
        } => RuleItem::SeparatedList {
            min,
            max,
            item: index_item(arena, path.child(0), *item),
            separator: index_item(arena, path.child(1), *separator),
        },
    };
    arena.alloc(item, path)
}
