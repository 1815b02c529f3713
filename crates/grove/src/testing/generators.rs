//! # Grammar-Driven Sentence Generators
//!
//! Produce random sentences a grammar derives, for property-based tests and
//! fuzzing. Pattern terminals have no canonical text, so they are filled in
//! from samples supplied through [`GeneratorConfig::with_sample`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grove::testing::{GeneratorConfig, GrammarGenerator};
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn parse_generated_input(seed in any::<u64>()) {
//!         let generator = GrammarGenerator::new(&grammar, GeneratorConfig::default().with_seed(seed))?;
//!         if let Some(text) = generator.generate("expr") {
//!             prop_assert!(parser.parse("expr", &text).is_ok());
//!         }
//!     }
//! }
//! ```
//!
//! Sentences are derivable by construction. Whether the parser accepts them
//! also depends on terminals not overlapping: a greedy pattern followed by
//! text it can also match will swallow that text.

use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::runtime::{RuleId, RuntimeRuleKind, RuntimeRuleSet, TerminalMatcher};
use hashbrown::HashMap;
use std::sync::Arc;

/// Configuration for grammar-based input generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Rule nesting after which generation steers towards the shortest derivation
    pub max_depth: usize,
    /// Upper bound for unbounded repetitions
    pub max_repetitions: usize,
    /// Seed for reproducible generation
    pub seed: Option<u64>,
    /// Text emitted after a terminal with probability `skip_probability`
    pub skip_text: Option<String>,
    pub skip_probability: f64,
    /// Candidate texts for each pattern terminal, keyed by pattern source
    pub pattern_samples: HashMap<String, Vec<String>, ahash::RandomState>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_repetitions: 5,
            seed: None,
            skip_text: None,
            skip_probability: 0.5,
            pattern_samples: HashMap::default(),
        }
    }
}

impl GeneratorConfig {
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_skip_text(mut self, text: impl Into<String>) -> Self {
        self.skip_text = Some(text.into());
        self
    }

    /// Add `sample` as a text the pattern `pattern` may generate
    #[must_use]
    pub fn with_sample(mut self, pattern: impl Into<String>, sample: impl Into<String>) -> Self {
        self.pattern_samples
            .entry(pattern.into())
            .or_default()
            .push(sample.into());
        self
    }
}

/// Generator for sentences of a grammar
pub struct GrammarGenerator {
    rules: Arc<RuntimeRuleSet>,
    config: GeneratorConfig,
    /// Nesting needed by each rule's shortest derivation; `usize::MAX` if none
    heights: Vec<usize>,
}

impl GrammarGenerator {
    /// # Errors
    ///
    /// Returns a [`GrammarError`] if the grammar does not compile.
    pub fn new(grammar: &Arc<Grammar>, config: GeneratorConfig) -> Result<Self, GrammarError> {
        let rules = grammar.runtime_rule_set()?;
        let heights = derivation_heights(&rules);
        Ok(Self {
            rules,
            config,
            heights,
        })
    }

    /// Generate a random sentence derived from `goal`
    ///
    /// Returns `None` if `goal` is unknown, has no finite derivation, or needs
    /// a pattern without samples.
    #[must_use]
    pub fn generate(&self, goal: &str) -> Option<String> {
        let mut rng = self.config.seed.map_or_else(SimpleRng::new, SimpleRng::with_seed);
        self.generate_with(goal, &mut rng)
    }

    fn generate_with(&self, goal: &str, rng: &mut SimpleRng) -> Option<String> {
        let goal = self.rules.rule_id(goal)?;
        if self.heights[goal.index()] == usize::MAX {
            return None;
        }
        let mut out = String::new();
        if self.rules.skip_rules().is_empty() {
            self.emit(goal, 0, &mut out, rng)?;
            return Some(out);
        }
        self.emit_skip(&mut out, rng);
        self.emit(goal, 0, &mut out, rng)?;
        Some(out)
    }

    fn emit(&self, id: RuleId, depth: usize, out: &mut String, rng: &mut SimpleRng) -> Option<()> {
        let shortest = depth >= self.config.max_depth;
        match self.rules.rule(id).kind() {
            RuntimeRuleKind::Terminal(matcher) => self.emit_terminal(matcher, out, rng),
            RuntimeRuleKind::Concatenation(items) => {
                for item in items {
                    self.emit(*item, depth + 1, out, rng)?;
                }
                Some(())
            }
            RuntimeRuleKind::Choice { alternatives, .. } => {
                let finite: Vec<&[RuleId]> = alternatives
                    .iter()
                    .map(|alternative| alternative.as_slice())
                    .filter(|alternative| self.sequence_height(alternative) != usize::MAX)
                    .collect();
                let chosen = if shortest {
                    finite
                        .iter()
                        .min_by_key(|alternative| self.sequence_height(alternative))
                        .copied()
                } else {
                    finite.get(rng.below(finite.len())).copied()
                }?;
                for item in chosen {
                    self.emit(*item, depth + 1, out, rng)?;
                }
                Some(())
            }
            RuntimeRuleKind::Multi { min, max, item } => {
                let count = self.repetitions(*min, *max, shortest, rng);
                for _ in 0..count {
                    self.emit(*item, depth + 1, out, rng)?;
                }
                Some(())
            }
            RuntimeRuleKind::SeparatedList {
                min,
                max,
                item,
                separator,
            } => {
                let count = self.repetitions(*min, *max, shortest, rng);
                for index in 0..count {
                    if index > 0 {
                        self.emit(*separator, depth + 1, out, rng)?;
                    }
                    self.emit(*item, depth + 1, out, rng)?;
                }
                Some(())
            }
        }
    }

    fn emit_terminal(&self, matcher: &TerminalMatcher, out: &mut String, rng: &mut SimpleRng) -> Option<()> {
        match matcher {
            TerminalMatcher::Literal(text) => out.push_str(text),
            TerminalMatcher::Pattern { source, .. } => {
                let samples = self.config.pattern_samples.get(source.as_str())?;
                out.push_str(samples.get(rng.below(samples.len()))?);
            }
            TerminalMatcher::Empty => return Some(()),
        }
        if !self.rules.skip_rules().is_empty() {
            self.emit_skip(out, rng);
        }
        Some(())
    }

    fn emit_skip(&self, out: &mut String, rng: &mut SimpleRng) {
        if let Some(skip) = &self.config.skip_text {
            if rng.next_f64() < self.config.skip_probability {
                out.push_str(skip);
            }
        }
    }

    fn repetitions(&self, min: usize, max: Option<usize>, shortest: bool, rng: &mut SimpleRng) -> usize {
        if shortest {
            return min;
        }
        let max = max.unwrap_or_else(|| min.max(self.config.max_repetitions));
        min + rng.below(max.saturating_sub(min).saturating_add(1))
    }

    fn sequence_height(&self, items: &[RuleId]) -> usize {
        sequence_height(&self.heights, items)
    }
}

fn sequence_height(heights: &[usize], items: &[RuleId]) -> usize {
    items
        .iter()
        .map(|item| heights[item.index()])
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Least fixpoint of the nesting each rule needs to derive a sentence
fn derivation_heights(rules: &RuntimeRuleSet) -> Vec<usize> {
    let mut heights = vec![usize::MAX; rules.len()];
    loop {
        let mut changed = false;
        for rule in rules.rules() {
            let height = match rule.kind() {
                RuntimeRuleKind::Terminal(_) => 0,
                RuntimeRuleKind::Concatenation(items) => sequence_height(&heights, items),
                RuntimeRuleKind::Choice { alternatives, .. } => alternatives
                    .iter()
                    .map(|alternative| sequence_height(&heights, alternative))
                    .min()
                    .unwrap_or(usize::MAX),
                RuntimeRuleKind::Multi { min: 0, .. }
                | RuntimeRuleKind::SeparatedList { min: 0, .. } => 1,
                RuntimeRuleKind::Multi { item, .. } => sequence_height(&heights, &[*item]),
                RuntimeRuleKind::SeparatedList {
                    min, item, separator, ..
                } => {
                    if *min == 1 {
                        sequence_height(&heights, &[*item])
                    } else {
                        sequence_height(&heights, &[*item, *separator])
                    }
                }
            };
            let slot = &mut heights[rule.id().index()];
            if height < *slot {
                *slot = height;
                changed = true;
            }
        }
        if !changed {
            return heights;
        }
    }
}

/// Character-level edits applied by [`GrammarFuzzer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMutation {
    Delete(usize),
    /// Insert a copy of the character at the second index before the first
    Insert(usize, usize),
    Swap(usize, usize),
    Duplicate(usize),
}

/// Fuzzer that derives mostly-valid inputs and then damages them
pub struct GrammarFuzzer {
    generator: GrammarGenerator,
}

impl GrammarFuzzer {
    /// # Errors
    ///
    /// Returns a [`GrammarError`] if the grammar does not compile.
    pub fn new(grammar: &Arc<Grammar>, config: GeneratorConfig) -> Result<Self, GrammarError> {
        Ok(Self {
            generator: GrammarGenerator::new(grammar, config)?,
        })
    }

    /// Generate a sentence of `goal` with `mutations` random edits applied
    #[must_use]
    pub fn generate_mutated(&self, goal: &str, mutations: usize) -> Option<String> {
        let mut rng = self
            .generator
            .config
            .seed
            .map_or_else(SimpleRng::new, SimpleRng::with_seed);
        let text = self.generator.generate_with(goal, &mut rng)?;
        let mut chars: Vec<char> = text.chars().collect();

        for _ in 0..mutations {
            if chars.is_empty() {
                break;
            }
            let index = rng.below(chars.len());
            let other = rng.below(chars.len());
            let mutation = match rng.below(4) {
                0 => TextMutation::Delete(index),
                1 => TextMutation::Insert(index, other),
                2 => TextMutation::Swap(index, other),
                _ => TextMutation::Duplicate(index),
            };
            apply_mutation(&mut chars, mutation);
        }

        Some(chars.into_iter().collect())
    }
}

fn apply_mutation(chars: &mut Vec<char>, mutation: TextMutation) {
    match mutation {
        TextMutation::Delete(index) if index < chars.len() => {
            chars.remove(index);
        }
        TextMutation::Insert(index, source) if index <= chars.len() && source < chars.len() => {
            let c = chars[source];
            chars.insert(index, c);
        }
        TextMutation::Swap(a, b) if a < chars.len() && b < chars.len() => chars.swap(a, b),
        TextMutation::Duplicate(index) if index < chars.len() => {
            let c = chars[index];
            chars.insert(index, c);
        }
        _ => {}
    }
}

/// Simple RNG for deterministic testing
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    const fn new() -> Self {
        Self {
            state: 0x853c_49e6_748f_ea9b,
        }
    }

    /// A zero seed would make xorshift emit zeros forever
    const fn with_seed(seed: u64) -> Self {
        if seed == 0 {
            Self::new()
        } else {
            Self { state: seed }
        }
    }

    fn next_u64(&mut self) -> u64 {
        // XorShift algorithm
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Uniform-ish value in `0..bound`; 0 when `bound` is 0
    #[allow(clippy::cast_possible_truncation)]
    fn below(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % bound as u64) as usize
    }
}
