#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offset into the parsed input (UTF-8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextSize(u32);

/// Half-open byte span `start..end` of the parsed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextRange {
    start: TextSize,
    end: TextSize,
}

impl TextSize {
    /// Convert an engine offset, saturating on inputs beyond 4 GiB.
    #[must_use]
    pub fn of(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TextRange {
    /// Span between two engine offsets.
    #[must_use]
    pub fn of(start: usize, end: usize) -> Self {
        Self {
            start: TextSize::of(start),
            end: TextSize::of(end),
        }
    }

    /// Zero-width span at `offset`, where a failed parse stopped
    #[must_use]
    pub const fn empty(offset: TextSize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    #[must_use]
    pub const fn start(self) -> TextSize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> TextSize {
        self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(feature = "diagnostics")]
impl From<TextRange> for miette::SourceSpan {
    fn from(range: TextRange) -> Self {
        let start = range.start.to_usize();
        Self::new(start.into(), range.end.to_usize().saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_saturate() {
        assert_eq!(TextSize::of(42).to_usize(), 42);
        assert_eq!(TextSize::of(usize::MAX).to_usize(), u32::MAX as usize);
    }

    #[test]
    fn test_failure_span_is_empty() {
        let at = TextRange::empty(TextSize::of(4));
        assert_eq!(at.start(), at.end());
        assert_eq!(at.to_string(), "4..4");
    }

    #[test]
    fn test_text_range_display() {
        assert_eq!(format!("{}", TextRange::of(1, 4)), "1..4");
    }
}
