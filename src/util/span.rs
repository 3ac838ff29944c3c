//! Source location tracking

use std::fmt;

use serde::Serialize;

/// Source position (line, column, and byte offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of the statement text
    #[serde(skip)]
    pub offset: usize,
}

impl Position {
    /// Create a new position
    #[inline]
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }

    /// Create a new position with offset
    #[inline]
    pub fn with_offset(
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Same line and column, offsets ignored
    #[inline]
    pub fn same_place(
        &self,
        other: &Position,
    ) -> bool {
        self.line == other.line && self.column == other.column
    }
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source span (start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (last character; offset is exclusive)
    pub end: Position,
}

impl Span {
    /// Create a new span
    #[inline]
    pub fn new(
        start: Position,
        end: Position,
    ) -> Self {
        Self { start, end }
    }

    /// Span covering a single position
    #[inline]
    pub fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(
        &self,
        other: &Span,
    ) -> Span {
        let start = if other.start.offset < self.start.offset {
            other.start
        } else {
            self.start
        };
        let end = if other.end.offset > self.end.offset {
            other.end
        } else {
            self.end
        };
        Span { start, end }
    }

    /// Start and end render to the same `line:column`
    #[inline]
    pub fn is_point(&self) -> bool {
        self.start.same_place(&self.end)
    }

    /// Get the source text length
    #[inline]
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// Check if span is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

/// Renders as `line:column` or `line:column:endLine:endColumn`
impl fmt::Display for Span {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_point() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}
