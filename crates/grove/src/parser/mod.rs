//! # Parser Module
//!
//! [`ScannerlessParser`] derives a goal rule directly over the characters of
//! an input, with no separate lexing step, and returns every derivation as a
//! [`SharedPackedParseTree`].
//!
//! ## Example
//!
//! ```rust
//! use grove::grammar::{Expr, GrammarBuilder};
//! use grove::parser::ScannerlessParser;
//!
//! let grammar = GrammarBuilder::new("test", "Expressions")
//!     .rule(
//!         "e",
//!         Expr::priority_choice([
//!             Expr::non_terminal("variable"),
//!             Expr::non_terminal("multiply"),
//!             Expr::non_terminal("plus"),
//!         ]),
//!     )
//!     .rule("variable", Expr::pattern("[a-z]"))
//!     .rule(
//!         "multiply",
//!         Expr::concatenation([Expr::non_terminal("e"), Expr::literal("*"), Expr::non_terminal("e")]),
//!     )
//!     .rule(
//!         "plus",
//!         Expr::concatenation([Expr::non_terminal("e"), Expr::literal("+"), Expr::non_terminal("e")]),
//!     )
//!     .build()?;
//!
//! let parser = ScannerlessParser::new(&grammar)?;
//! let tree = parser.parse("e", "a+b*c")?;
//! assert_eq!(tree.root().as_branch()?.child(0)?.name(), "plus");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod engine;
pub mod parallel;

pub use config::{ParserConfig, DEFAULT_MAX_DEPTH};
pub use parallel::{
    aggregate_results, FileParseResult, ParallelConfig, ParallelParser, ParseBatch, ParseSummary,
};

use crate::error::{GrammarError, ParseError};
use crate::grammar::Grammar;
use crate::runtime::{RuleId, RuntimeRuleSet};
use crate::sppf::SharedPackedParseTree;
use compact_str::CompactString;
use engine::Engine;
use std::sync::Arc;

/// The rule a parse should derive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goal {
    Name(CompactString),
    Id(RuleId),
}

impl From<&str> for Goal {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl From<&String> for Goal {
    fn from(name: &String) -> Self {
        Self::Name(name.as_str().into())
    }
}

impl From<String> for Goal {
    fn from(name: String) -> Self {
        Self::Name(name.into())
    }
}

impl From<RuleId> for Goal {
    fn from(id: RuleId) -> Self {
        Self::Id(id)
    }
}

/// Generalized scannerless parser over a compiled grammar
///
/// Cheap to clone; clones share the compiled rule set.
#[derive(Debug, Clone)]
pub struct ScannerlessParser {
    grammar: Arc<Grammar>,
    rules: Arc<RuntimeRuleSet>,
    config: ParserConfig,
}

impl ScannerlessParser {
    /// Compile `grammar` (or reuse its cached rule set) and build a parser
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] if the grammar does not compile, for example
    /// when a non-terminal cannot be resolved.
    pub fn new(grammar: &Arc<Grammar>) -> Result<Self, GrammarError> {
        Ok(Self {
            grammar: Arc::clone(grammar),
            rules: grammar.runtime_rule_set()?,
            config: ParserConfig::default(),
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[must_use]
    pub const fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    #[must_use]
    pub const fn rule_set(&self) -> &Arc<RuntimeRuleSet> {
        &self.rules
    }

    /// Derive `goal` over the whole of `text`
    ///
    /// # Errors
    ///
    /// - [`ParseError::Grammar`] if `goal` names no rule of the grammar
    /// - [`ParseError::Failed`] if `goal` does not derive `text`; the error
    ///   carries the longest partial forest
    /// - [`ParseError::StepLimitExceeded`] or [`ParseError::DepthLimitExceeded`]
    ///   when a configured limit is hit
    pub fn parse(
        &self,
        goal: impl Into<Goal>,
        text: &str,
    ) -> Result<SharedPackedParseTree, ParseError> {
        let goal = self.resolve(&goal.into())?;
        let input: Arc<str> = Arc::from(text);
        Engine::new(&self.rules, &input, &self.config).run(goal)
    }

    fn resolve(&self, goal: &Goal) -> Result<RuleId, GrammarError> {
        match goal {
            Goal::Name(name) => self.rules.find(name),
            Goal::Id(id) => self.rules.get(*id).map(|rule| rule.id()).ok_or_else(|| {
                GrammarError::rule_not_found(&id.to_string(), self.rules.grammar_name(), 0)
            }),
        }
    }
}
