//! Builder-side rule expressions.
//!
//! An [`Expr`] is the unindexed description of a right-hand side handed to
//! [`GrammarBuilder`](crate::grammar::GrammarBuilder). The builder validates
//! it and indexes it into the grammar's item arena; nothing downstream sees
//! an `Expr`.

use compact_str::CompactString;

/// Right-hand side expression used to declare rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Exact text
    Literal(CompactString),
    /// Regular expression, matched anchored at the current offset
    Pattern(CompactString),
    /// Reference to another rule by name
    NonTerminal(CompactString),
    /// Items matched in order
    Concatenation(Vec<Expr>),
    /// Alternatives, all of which are kept when they match the same span
    Choice(Vec<Expr>),
    /// Alternatives in rising rank; only the highest-ranked survives a contested span
    PriorityChoice(Vec<Expr>),
    /// Parenthesised choice or concatenation used as one item
    Group(Box<Expr>),
    /// Bounded or unbounded repetition
    Multi {
        item: Box<Expr>,
        min: usize,
        max: Option<usize>,
    },
    /// Repetition with a literal separator between items
    SeparatedList {
        item: Box<Expr>,
        separator: Box<Expr>,
        min: usize,
        max: Option<usize>,
    },
}

impl Expr {
    #[must_use]
    pub fn literal(text: impl Into<CompactString>) -> Self {
        Self::Literal(text.into())
    }

    #[must_use]
    pub fn pattern(regex: impl Into<CompactString>) -> Self {
        Self::Pattern(regex.into())
    }

    #[must_use]
    pub fn non_terminal(name: impl Into<CompactString>) -> Self {
        Self::NonTerminal(name.into())
    }

    #[must_use]
    pub fn concatenation<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::Concatenation(items.into_iter().collect())
    }

    #[must_use]
    pub fn choice<I>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::Choice(alternatives.into_iter().collect())
    }

    /// Priority choice, alternatives listed lowest rank first
    #[must_use]
    pub fn priority_choice<I>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self::PriorityChoice(alternatives.into_iter().collect())
    }

    #[must_use]
    pub fn group(inner: Self) -> Self {
        Self::Group(Box::new(inner))
    }

    /// `item` repeated `min..=max` times; `max = None` is unbounded
    #[must_use]
    pub fn multi(min: usize, max: Option<usize>, item: Self) -> Self {
        Self::Multi {
            item: Box::new(item),
            min,
            max,
        }
    }

    /// Zero or one `item`
    #[must_use]
    pub fn optional(item: Self) -> Self {
        Self::multi(0, Some(1), item)
    }

    #[must_use]
    pub fn separated_list(
        min: usize,
        max: Option<usize>,
        separator: impl Into<CompactString>,
        item: Self,
    ) -> Self {
        Self::SeparatedList {
            item: Box::new(item),
            separator: Box::new(Self::Literal(separator.into())),
            min,
            max,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Literal(_) | Self::Pattern(_))
    }
}
