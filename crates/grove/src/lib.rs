//! # Grove
//!
//! A generalized, scannerless parsing library: grammars are written directly
//! over characters (literals and regular expressions, no lexer), any
//! context-free grammar is accepted, including ambiguous and left-recursive
//! ones, and every derivation of the input is returned in a Shared Packed
//! Parse Forest.
//!
//! ## Overview
//!
//! - **Grammar definition**: [`GrammarBuilder`] with concatenation, choice,
//!   priority choice, repetition and separated lists; grammars can extend
//!   other grammars and override their rules
//! - **Skip rules**: whitespace and comments are matched implicitly after
//!   every terminal and kept in the forest
//! - **Runtime rule sets**: grammars compile once into a flat, shareable
//!   [`RuntimeRuleSet`](runtime::RuntimeRuleSet)
//! - **Parse forests**: [`SharedPackedParseTree`] packs ambiguous
//!   derivations, shares sub-derivations and round-trips to the input text
//!
//! ## Quick Start
//!
//! ```rust
//! use grove::{Expr, GrammarBuilder, ScannerlessParser};
//!
//! let grammar = GrammarBuilder::new("example", "Lists")
//!     .skip_rule("WS", Expr::pattern(r"\s+"))
//!     .rule("list", Expr::separated_list(1, None, ",", Expr::non_terminal("item")))
//!     .rule("item", Expr::pattern("[a-z]+"))
//!     .build()?;
//!
//! let parser = ScannerlessParser::new(&grammar)?;
//! let tree = parser.parse("list", "ab, cd")?;
//!
//! let items: Vec<&str> = tree
//!     .root()
//!     .as_branch()?
//!     .non_skip_children()
//!     .filter(|child| child.name() == "item")
//!     .map(|child| child.matched_text())
//!     .collect();
//! assert_eq!(items, ["ab", "cd"]);
//! assert_eq!(tree.reconstruct_text(), "ab, cd");
//!
//! let failure = parser.parse("list", "ab,,cd").unwrap_err();
//! assert_eq!(failure.longest_match().map(|tree| tree.root().end()), Some(2));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar definition, inheritance and validation
//! - [`runtime`] - Compiled runtime rule sets
//! - [`parser`] - The scannerless parser and batch parsing
//! - [`sppf`] - Shared packed parse forests and their traversal
//! - [`error`] - Error types and diagnostics
//! - [`testing`] - Sentence generators for property tests and fuzzing

pub mod error;
pub mod grammar;
pub mod parser;
pub mod runtime;
pub mod sppf;
pub mod testing;

// Re-export commonly used types
pub use error::{GrammarError, ParseError, ParseFailed, ParseMetrics, ParseTreeError};
pub use grammar::{ChoiceKind, Expr, Grammar, GrammarBuilder, Namespace, Rule};
pub use parser::{Goal, ParserConfig, ScannerlessParser};
pub use runtime::{RuleId, RuntimeRuleSet};
pub use sppf::{
    AlternativeSelection, BranchRef, LeafRef, NodeRef, SharedPackedParseTree, SppfVisitor,
    SppfWalker, TextRange, TextSize,
};
