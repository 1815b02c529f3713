//! # Error Types
//!
//! Errors raised while building grammars, compiling them into runtime rule
//! sets, parsing, and querying the resulting forests.
//!
//! ## Error Types
//!
//! - [`GrammarError`]: invalid grammar shape, or a rule that cannot be
//!   resolved ([`GrammarError::RuleNotFound`]). Fatal to compilation.
//! - [`ParseFailed`]: the goal could not be derived over the whole input.
//!   Carries the longest partial forest so callers can report how far the
//!   input was understood.
//! - [`ParseTreeError`]: a structural query on a forest was invalid, such as
//!   asking a leaf for its children.
//! - [`ParseError`]: everything [`ScannerlessParser::parse`] can return.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! for rich error reporting with source code snippets.
//!
//! [`ScannerlessParser::parse`]: crate::parser::ScannerlessParser::parse

pub mod diagnostics;

use crate::sppf::{SharedPackedParseTree, TextRange, TextSize};
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Errors found while building a grammar or compiling it to a runtime rule set
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    /// A lookup matched no rule, or `find_rule` matched more than one local rule
    #[error("Rule '{name}' not found in grammar '{grammar}'")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grove::grammar::rule_not_found),
            help("check the rule name and the grammars listed in `extends`")
        )
    )]
    RuleNotFound {
        name: String,
        grammar: String,
        /// Number of local rules carrying the name
        matches: usize,
    },

    #[error("Duplicate rule '{name}' in grammar '{grammar}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::duplicate_rule)))]
    DuplicateRule { name: String, grammar: String },

    #[error("Rule '{rule}' contains an empty concatenation")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::empty_concatenation)))]
    EmptyConcatenation { rule: String },

    #[error("Rule '{rule}' contains a choice without alternatives")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::empty_choice)))]
    EmptyChoice { rule: String },

    #[error("Rule '{rule}' contains an empty literal")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::empty_literal)))]
    EmptyLiteral { rule: String },

    #[error("Rule '{rule}' has a repetition with min {min} greater than max {max}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::invalid_multiplicity)))]
    InvalidMultiplicity { rule: String, min: usize, max: usize },

    #[error("Rule '{rule}' has a separated list whose separator is not a literal")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::invalid_separator)))]
    InvalidSeparator { rule: String },

    #[error("Rule '{rule}' has an invalid pattern /{pattern}/")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::grammar::invalid_pattern)))]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl GrammarError {
    #[must_use]
    pub fn rule_not_found(name: &str, grammar: &str, matches: usize) -> Self {
        Self::RuleNotFound {
            name: name.to_string(),
            grammar: grammar.to_string(),
            matches,
        }
    }
}

/// The goal could not be derived over the whole input
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("Parse of '{goal}' failed: longest match {span}, stopped at offset {failure_offset}")]
#[cfg_attr(feature = "diagnostics", diagnostic(code(grove::parse::failed)))]
pub struct ParseFailed {
    /// Name of the goal rule
    pub goal: String,
    /// Span of the longest partial derivation (empty at the goal offset if nothing matched)
    #[cfg_attr(feature = "diagnostics", label("longest match"))]
    pub span: TextRange,
    /// Furthest offset at which a terminal was attempted
    pub failure_offset: TextSize,
    /// Terminals that were expected at `failure_offset`
    pub expected: Vec<String>,
    /// Forest of the longest partial derivation, if anything matched
    pub longest_match: Option<SharedPackedParseTree>,
}

impl ParseFailed {
    /// Human readable list of the expected terminals
    #[must_use]
    pub fn format_expected(&self) -> String {
        format_expected_list(&self.expected)
    }
}

/// Invalid structural query on a parse forest
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseTreeError {
    #[error("Node '{name}' at {range} is a leaf, not a branch")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::tree::not_a_branch)))]
    NotABranch { name: String, range: TextRange },

    #[error("Node '{name}' at {range} is a branch, not a leaf")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::tree::not_a_leaf)))]
    NotALeaf { name: String, range: TextRange },

    #[error("Child {index} requested from node '{name}' which has {len} children")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::tree::child_out_of_range)))]
    ChildOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("Alternative {index} requested from node '{name}' which has {len} alternatives")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(grove::tree::alternative_out_of_range))
    )]
    AlternativeOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("Node id {0} does not belong to this forest")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grove::tree::unknown_node)))]
    UnknownNode(usize),
}

/// Errors returned by [`ScannerlessParser::parse`](crate::parser::ScannerlessParser::parse)
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Failed(Box<ParseFailed>),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Tree(#[from] ParseTreeError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Grammar(#[from] GrammarError),

    #[error("Parse exceeded the step limit of {limit}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grove::parse::step_limit),
            help("raise `ParserConfig::max_steps` or simplify the grammar")
        )
    )]
    StepLimitExceeded { limit: usize },

    #[error("Parse exceeded the derivation depth limit of {limit}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(grove::parse::depth_limit),
            help("raise `ParserConfig::max_depth`")
        )
    )]
    DepthLimitExceeded { limit: usize },
}

impl From<ParseFailed> for ParseError {
    fn from(failed: ParseFailed) -> Self {
        Self::Failed(Box::new(failed))
    }
}

impl ParseError {
    /// The failure details, if the goal simply did not match the input
    #[must_use]
    pub fn as_failed(&self) -> Option<&ParseFailed> {
        match self {
            Self::Failed(failed) => Some(failed),
            _ => None,
        }
    }

    /// Longest partial forest of a failed parse
    #[must_use]
    pub fn longest_match(&self) -> Option<&SharedPackedParseTree> {
        self.as_failed().and_then(|failed| failed.longest_match.as_ref())
    }
}

/// Format a list of expected terminals as a human-readable string
#[must_use]
pub fn format_expected_list(expected: &[String]) -> String {
    match expected.len() {
        0 => "nothing".to_string(),
        1 => expected[0].clone(),
        2 => format!("{} or {}", expected[0], expected[1]),
        _ => {
            let mut result = expected[..expected.len() - 1].join(", ");
            result.push_str(", or ");
            result.push_str(&expected[expected.len() - 1]);
            result
        }
    }
}

/// Counters gathered during a single parse
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseMetrics {
    /// Item derivations attempted
    pub steps: usize,
    /// Forest nodes created, including nodes later dropped from the result
    pub nodes_created: usize,
    /// Derivations answered from the memo table
    pub memo_hits: usize,
    /// Extra passes spent growing left-recursive derivations
    pub growth_passes: usize,
    pub parse_time: std::time::Duration,
}
