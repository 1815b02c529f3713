#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Rule nesting allowed by [`ParserConfig::default`]
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration options for [`ScannerlessParser`](super::ScannerlessParser).
///
/// Parsing an ambiguous or deeply nested input can do a lot of work; the
/// limits bound a single call. Steps are unbounded by default. Depth is
/// capped at [`DEFAULT_MAX_DEPTH`] so that deep right recursion ends in
/// [`ParseError::DepthLimitExceeded`](crate::ParseError::DepthLimitExceeded)
/// instead of overflowing a 2 MiB thread stack.
///
/// # Example
///
/// ```rust
/// use grove::parser::ParserConfig;
///
/// let config = ParserConfig::default()
///     .with_max_steps(1_000_000)
///     .with_max_depth(512);
/// assert_eq!(config.max_steps, Some(1_000_000));
/// assert!(config.collect_expected);
///
/// let unbounded = ParserConfig { max_depth: None, ..ParserConfig::default() };
/// assert_eq!(unbounded.max_depth, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParserConfig {
    /// Maximum number of item derivations before giving up
    pub max_steps: Option<usize>,

    /// Maximum nesting of rule derivations
    ///
    /// Each nested rule costs native stack frames. Raising this, or setting
    /// it to `None`, needs a thread with a matching stack size.
    pub max_depth: Option<usize>,

    /// Record which terminals were expected at the failure offset
    pub collect_expected: bool,

    /// Keep only nodes reachable from the root in the returned forest
    ///
    /// When disabled the tree also contains abandoned derivations, which can
    /// help when debugging a grammar.
    pub compact_forest: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_depth: Some(DEFAULT_MAX_DEPTH),
            collect_expected: true,
            compact_forest: true,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    #[must_use]
    pub const fn with_collect_expected(mut self, collect_expected: bool) -> Self {
        self.collect_expected = collect_expected;
        self
    }

    #[must_use]
    pub const fn with_compact_forest(mut self, compact_forest: bool) -> Self {
        self.compact_forest = compact_forest;
        self
    }
}
