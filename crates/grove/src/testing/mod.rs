//! # Testing Utilities
//!
//! Utilities for testing grammars and the parser.
//!
//! ## Property-Based Testing
//!
//! [`GrammarGenerator`] produces random sentences of a grammar from a seed,
//! so a `proptest` strategy over `u64` seeds becomes a strategy over
//! sentences.
//!
//! ## Fuzzing Support
//!
//! [`GrammarFuzzer`] damages generated sentences with character-level
//! edits, giving inputs that are close to valid and exercise the failure
//! path.

pub mod generators;

pub use generators::*;
