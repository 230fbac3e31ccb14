//! Line/column source spans and the index that derives them from byte ranges.

use ruff_text_size::{TextRange, TextSize};

/// A line/column span in a cell's source text.
///
/// Lines are 1-indexed to match Python tracebacks; columns are 0-indexed byte
/// offsets within their line, matching CPython's `col_offset` convention.
///
/// Every field is optional: module roots carry no position at all, synthesized
/// expressions carry no end line, and pragma entries carry only a line. The
/// remapper shifts whatever is present and leaves absent fields untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
}

impl SourceSpan {
    /// A span with no position information (module roots).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        }
    }

    /// A span carrying only a line number (pragma comments).
    #[must_use]
    pub const fn line_only(line: u32) -> Self {
        Self {
            line: Some(line),
            column: None,
            end_line: None,
            end_column: None,
        }
    }

    /// A fully-populated span.
    #[must_use]
    pub const fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            end_line: Some(end_line),
            end_column: Some(end_column),
        }
    }
}

/// Byte-offset to line/column conversion for a single source buffer.
///
/// Built once per compilation from a scan for newlines, then bisected per
/// lookup. Offsets past the end of the buffer resolve to the final line.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset at which each line starts; `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(code: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in code.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset into a (1-indexed line, 0-indexed column) pair.
    #[must_use]
    pub fn location(&self, offset: TextSize) -> (u32, u32) {
        let offset = offset.to_usize();
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let column = offset - self.line_starts[line - 1];
        (line as u32, column as u32)
    }

    /// Converts a byte range into a fully-populated span.
    #[must_use]
    pub fn span(&self, range: TextRange) -> SourceSpan {
        let (line, column) = self.location(range.start());
        let (end_line, end_column) = self.location(range.end());
        SourceSpan::new(line, column, end_line, end_column)
    }

    /// Number of lines in the indexed buffer.
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }
}
