//! Source locations
//!
//! Every node of the typed tree carries a [`Span`]. Spans are ordered
//! (file, then start, then end) so they can be compared and merged
//! deterministically by downstream passes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a source file within the model being analysed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct FileId(pub u32);

/// A 1-based line/column position
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A source span: start and end positions within one file
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Span {
    pub file: FileId,
    pub start: LineCol,
    pub end: LineCol,
}

impl Span {
    pub const fn new(file: FileId, start: LineCol, end: LineCol) -> Self {
        Self { file, start, end }
    }

    /// A zero-width span at `line:col`
    pub const fn point(file: FileId, line: u32, col: u32) -> Self {
        let pos = LineCol::new(line, col);
        Self {
            file,
            start: pos,
            end: pos,
        }
    }

    /// Placeholder span for synthesized nodes
    pub const fn dummy() -> Self {
        Self::point(FileId(0), 0, 0)
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(self, other: Span) -> Span {
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{}", self.start.line, self.start.col)
    }
}

/// A node paired with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_ordering_is_positional() {
        let a = Span::point(FileId(0), 3, 5);
        let b = Span::point(FileId(0), 3, 9);
        let c = Span::point(FileId(0), 10, 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.min(c), a);
    }

    #[test]
    fn test_merge_covers_both() {
        let a = Span::new(FileId(0), LineCol::new(2, 1), LineCol::new(2, 8));
        let b = Span::new(FileId(0), LineCol::new(4, 3), LineCol::new(5, 2));
        let m = a.merge(b);
        assert_eq!(m.start, LineCol::new(2, 1));
        assert_eq!(m.end, LineCol::new(5, 2));
        assert_eq!(m.to_string(), "line 2:1");
    }
}
