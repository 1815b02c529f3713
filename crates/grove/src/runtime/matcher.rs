use crate::error::GrammarError;
use crate::grammar::{Terminal, TerminalKind};
use compact_str::CompactString;
use regex::Regex;

/// Pre-compiled terminal test
#[derive(Debug, Clone)]
pub enum TerminalMatcher {
    Literal(CompactString),
    /// Anchored at the start of the remaining input
    Pattern { source: CompactString, regex: Regex },
    Empty,
}

impl TerminalMatcher {
    /// Compile `terminal`; `rule` names the owner for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidPattern`] if a pattern does not compile.
    pub fn compile(rule: &str, terminal: &Terminal) -> Result<Self, GrammarError> {
        match terminal.kind() {
            TerminalKind::Literal => Ok(Self::Literal(terminal.value().into())),
            TerminalKind::Empty => Ok(Self::Empty),
            TerminalKind::Pattern => {
                let anchored = format!(r"\A(?:{})", terminal.value());
                let regex = Regex::new(&anchored).map_err(|source| GrammarError::InvalidPattern {
                    rule: rule.to_string(),
                    pattern: terminal.value().to_string(),
                    source,
                })?;
                Ok(Self::Pattern {
                    source: terminal.value().into(),
                    regex,
                })
            }
        }
    }

    /// End offset of a match starting at `offset`, if any.
    ///
    /// `offset` must lie on a character boundary of `input`.
    #[must_use]
    pub fn match_at(&self, input: &str, offset: usize) -> Option<usize> {
        let rest = input.get(offset..)?;
        match self {
            Self::Literal(text) => rest.starts_with(text.as_str()).then(|| offset + text.len()),
            Self::Pattern { regex, .. } => regex.find(rest).map(|found| offset + found.end()),
            Self::Empty => Some(offset),
        }
    }

    /// Display form used for rule names and expectations
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(text) => format!("'{text}'"),
            Self::Pattern { source, .. } => format!("\"{source}\""),
            Self::Empty => Terminal::EMPTY_NAME.to_string(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_match() {
        let matcher = TerminalMatcher::compile("r", &Terminal::literal("ab")).expect("literal");
        assert_eq!(matcher.match_at("xabab", 1), Some(3));
        assert_eq!(matcher.match_at("xabab", 2), None);
        assert_eq!(matcher.match_at("xa", 1), None);
    }

    #[test]
    fn test_pattern_is_anchored() {
        let matcher = TerminalMatcher::compile("r", &Terminal::pattern("[0-9]+")).expect("pattern");
        assert_eq!(matcher.match_at("ab123", 2), Some(5));
        assert_eq!(matcher.match_at("ab123", 0), None);
    }

    #[test]
    fn test_pattern_alternation_is_grouped() {
        let matcher = TerminalMatcher::compile("r", &Terminal::pattern("a|b")).expect("pattern");
        assert_eq!(matcher.match_at("xb", 0), None);
        assert_eq!(matcher.match_at("xb", 1), Some(2));
    }

    #[test]
    fn test_empty_matches_zero_width() {
        let matcher = TerminalMatcher::compile("r", &Terminal::empty()).expect("empty");
        assert_eq!(matcher.match_at("abc", 1), Some(1));
        assert_eq!(matcher.match_at("", 0), Some(0));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = TerminalMatcher::compile("r", &Terminal::pattern("(unclosed"));
        assert!(matches!(result, Err(GrammarError::InvalidPattern { .. })));
    }

    #[test]
    fn test_describe() {
        let literal = TerminalMatcher::compile("r", &Terminal::literal("+")).expect("literal");
        let pattern = TerminalMatcher::compile("r", &Terminal::pattern("\\s+")).expect("pattern");
        assert_eq!(literal.describe(), "'+'");
        assert_eq!(pattern.describe(), "\"\\s+\"");
    }
}
