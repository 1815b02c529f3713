//! # Diagnostic Utilities
//!
//! Plain-text rendering of parse failures for callers that do not use the
//! `diagnostics` feature:
//! - "Did you mean?" suggestions for misspelt rule names
//! - Line/column locations for byte offsets
//! - Failure messages with the surrounding input

use crate::error::ParseFailed;
use crate::runtime::RuntimeRuleSet;
use crate::sppf::{TextRange, TextSize};
use std::fmt::Write;

/// Suggest the candidate closest to `actual`, if any is similar enough
///
/// # Example
///
/// ```rust
/// use grove::error::diagnostics::did_you_mean;
///
/// let expected = vec!["expression".to_string(), "statement".to_string()];
/// assert_eq!(did_you_mean("expresion", &expected), Some("expression".to_string()));
/// ```
#[must_use]
pub fn did_you_mean(actual: &str, expected: &[String]) -> Option<String> {
    let actual_lower = actual.to_lowercase();
    let mut best_match: Option<(&String, f64)> = None;
    let threshold = 0.6;

    for candidate in expected {
        let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
        if similarity < threshold {
            continue;
        }
        match best_match {
            Some((_, best)) if similarity <= best => {}
            _ => best_match = Some((candidate, similarity)),
        }
    }

    best_match.map(|(suggestion, _)| suggestion.clone())
}

/// Declared rule of `rules` whose name is closest to `name`
#[must_use]
pub fn suggest_rule(rules: &RuntimeRuleSet, name: &str) -> Option<String> {
    let declared: Vec<String> = rules
        .rules()
        .filter(|rule| !rule.is_terminal() && !rule.is_pseudo())
        .map(|rule| rules.name(rule.id()).to_string())
        .collect();
    did_you_mean(name, &declared)
}

/// Zero-based line and column (in characters) of a byte offset
#[must_use]
pub fn line_col(source: &str, offset: TextSize) -> (usize, usize) {
    let offset = floor_char_boundary(source, offset.to_usize());
    let before = &source[..offset];
    let line = before.matches('\n').count();
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    (line, before[line_start..].chars().count())
}

/// `(before, span, after)` with up to `context_chars` bytes on either side,
/// widened to character boundaries
#[must_use]
pub fn extract_context(
    source: &str,
    span: TextRange,
    context_chars: usize,
) -> Option<(String, String, String)> {
    let start = span.start().to_usize();
    let end = span.end().to_usize();
    if start > end || end > source.len() {
        return None;
    }

    let context_start = floor_char_boundary(source, start.saturating_sub(context_chars));
    let context_end = ceil_char_boundary(source, (end + context_chars).min(source.len()));

    Some((
        source.get(context_start..start)?.to_string(),
        source.get(start..end)?.to_string(),
        source.get(end..context_end)?.to_string(),
    ))
}

/// The failure message, the input around the failure offset and the
/// expected terminals
#[must_use]
pub fn format_failure_with_context(failed: &ParseFailed, source: &str, context_chars: usize) -> String {
    let mut result = failed.to_string();

    let at = TextRange::empty(failed.failure_offset);
    if let Some((before, _, after)) = extract_context(source, at, context_chars) {
        result.push_str("\n\nContext:\n  ...");
        result.push_str(&before);
        result.push_str("[HERE]");
        result.push_str(&after);
        result.push_str("...");
    }

    if !failed.expected.is_empty() {
        let _ = write!(result, "\n\nExpected {}", failed.format_expected());
    }

    result
}

/// The failure message prefixed with `file:line:column`
#[must_use]
pub fn format_failure_with_location(failed: &ParseFailed, source: &str, filename: Option<&str>) -> String {
    let (line, column) = line_col(source, failed.failure_offset);
    let mut result = String::new();
    if let Some(filename) = filename {
        let _ = write!(result, "{filename}:");
    }
    let _ = write!(result, "{}:{}: {failed}", line + 1, column + 1);
    result
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    index = index.min(source.len());
    while !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(source: &str, mut index: usize) -> usize {
    while index < source.len() && !source.is_char_boundary(index) {
        index += 1;
    }
    index.min(source.len())
}

/// Similarity from Levenshtein distance: 0.0 (completely different) to 1.0
#[allow(clippy::cast_precision_loss)]
fn string_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let distance = levenshtein_distance(s1, s2);
    let max_len = s1.chars().count().max(s2.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s2_chars: Vec<char> = s2.chars().collect();
    let mut previous: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut current = vec![0; s2_chars.len() + 1];

    for (i, c1) in s1.chars().enumerate() {
        current[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = usize::from(c1 != *c2);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_at(offset: usize) -> ParseFailed {
        ParseFailed {
            goal: "list".to_string(),
            span: TextRange::of(0, offset),
            failure_offset: TextSize::of(offset),
            expected: vec!["'a'".to_string(), "','".to_string()],
            longest_match: None,
        }
    }

    #[test]
    fn test_did_you_mean() {
        let expected = vec!["identifier".to_string(), "number".to_string()];
        assert_eq!(did_you_mean("identifer", &expected), Some("identifier".to_string()));
        assert_eq!(did_you_mean("zzz", &expected), None);
        assert_eq!(did_you_mean("x", &[]), None);
    }

    #[test]
    fn test_string_similarity() {
        assert!((string_similarity("hello", "hello") - 1.0).abs() < f64::EPSILON);
        assert!(string_similarity("hello", "hell") > 0.5);
        assert!(string_similarity("hello", "world") < 0.5);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_line_col() {
        let source = "ab\ncd\nef";
        assert_eq!(line_col(source, TextSize::of(0)), (0, 0));
        assert_eq!(line_col(source, TextSize::of(4)), (1, 1));
        assert_eq!(line_col(source, TextSize::of(6)), (2, 0));
        assert_eq!(line_col("é!", TextSize::of(2)), (0, 1));
    }

    #[test]
    fn test_extract_context() {
        let source = "This is a test string";
        let (before, error, after) = extract_context(source, TextRange::of(10, 14), 5).expect("in bounds");
        assert_eq!(before, "is a ");
        assert_eq!(error, "test");
        assert_eq!(after, " stri");

        assert!(extract_context("Hello", TextRange::of(10, 15), 5).is_none());
    }

    #[test]
    fn test_extract_context_widens_to_char_boundaries() {
        let source = "aé b";
        let (before, error, after) = extract_context(source, TextRange::of(3, 4), 1).expect("in bounds");
        assert_eq!(before, "é");
        assert_eq!(error, " ");
        assert_eq!(after, "b");
    }

    #[test]
    fn test_format_failure_with_context() {
        let message = format_failure_with_context(&failed_at(3), "a,ab", 2);
        assert!(message.contains("Parse of 'list' failed"));
        assert!(message.contains(",a[HERE]b"));
        assert!(message.ends_with("Expected 'a' or ','"));
    }

    #[test]
    fn test_format_failure_with_location() {
        let message = format_failure_with_location(&failed_at(4), "a,\na,", Some("input.txt"));
        assert!(message.starts_with("input.txt:2:2: "));
    }
}
