//! In-place source-position remapping over an artifact's span tree.
//!
//! Compiled artifacts carry a tree of location-bearing nodes mirroring their
//! syntax tree (see [`crate::code`]). Re-anchoring a cell to its position in
//! a real file is a single recursive shift over that tree: lines move by the
//! anchor's line offset, columns by its column offset. A field a node does
//! not carry is left untouched, never defaulted.

use crate::span::SourceSpan;

/// A cell's true location in an authoring file: the file's path plus the
/// line/column offsets separating the cell's first character from the file's.
///
/// Absent for cells with no real backing file; those register a synthetic
/// filename with the debug line cache instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub filename: String,
    pub lineno: u32,
    pub col_offset: u32,
}

/// What kind of syntax a span-tree node mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// The artifact root; carries no position of its own.
    Module,
    Statement,
    Expression,
    /// A line-only entry for a `# type:` comment; has no column to shift.
    Pragma,
}

/// One location-bearing node of a compiled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanNode {
    pub kind: SpanKind,
    pub span: SourceSpan,
    pub children: Vec<SpanNode>,
}

impl SpanNode {
    #[must_use]
    pub fn new(kind: SpanKind, span: SourceSpan) -> Self {
        Self {
            kind,
            span,
            children: Vec::new(),
        }
    }

    /// Visits this node and every descendant, depth first.
    pub fn for_each(&self, f: &mut impl FnMut(&Self)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    /// Number of nodes in this subtree, the root included.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

/// Shifts every node of `node`'s subtree by the anchor's offsets, in place.
///
/// Total for any well-formed span tree: absent fields are skipped, so
/// line-only pragma nodes shift only their line and position-less module
/// roots do not move at all.
pub fn shift_spans(node: &mut SpanNode, position: &SourcePosition) {
    shift(node, position.lineno, position.col_offset);
}

fn shift(node: &mut SpanNode, lineno: u32, col_offset: u32) {
    shift_span(&mut node.span, lineno, col_offset);
    for child in &mut node.children {
        shift(child, lineno, col_offset);
    }
}

fn shift_span(span: &mut SourceSpan, lineno: u32, col_offset: u32) {
    if let Some(line) = &mut span.line {
        *line += lineno;
    }
    if let Some(end_line) = &mut span.end_line {
        *end_line += lineno;
    }
    if let Some(column) = &mut span.column {
        *column += col_offset;
    }
    if let Some(end_column) = &mut span.end_column {
        *end_column += col_offset;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn anchor(lineno: u32, col_offset: u32) -> SourcePosition {
        SourcePosition {
            filename: "nb.py".to_owned(),
            lineno,
            col_offset,
        }
    }

    #[test]
    fn shifts_lines_and_columns_recursively() {
        let mut root = SpanNode::new(SpanKind::Module, SourceSpan::none());
        let mut stmt = SpanNode::new(SpanKind::Statement, SourceSpan::new(1, 0, 2, 5));
        stmt.children
            .push(SpanNode::new(SpanKind::Expression, SourceSpan::new(2, 4, 2, 5)));
        root.children.push(stmt);

        shift_spans(&mut root, &anchor(10, 4));

        let stmt = &root.children[0];
        assert_eq!(stmt.span, SourceSpan::new(11, 4, 12, 9));
        assert_eq!(stmt.children[0].span, SourceSpan::new(12, 8, 12, 9));
    }

    #[test]
    fn pragma_nodes_shift_only_their_line() {
        let mut node = SpanNode::new(SpanKind::Pragma, SourceSpan::line_only(3));
        shift_spans(&mut node, &anchor(7, 4));
        assert_eq!(node.span, SourceSpan::line_only(10));
    }

    #[test]
    fn absent_fields_are_left_untouched() {
        // Synthesized expressions have no end line.
        let mut node = SpanNode::new(
            SpanKind::Expression,
            SourceSpan {
                line: Some(4),
                column: Some(5),
                end_line: None,
                end_column: Some(5),
            },
        );
        shift_spans(&mut node, &anchor(2, 1));
        assert_eq!(node.span.line, Some(6));
        assert_eq!(node.span.column, Some(6));
        assert_eq!(node.span.end_line, None);
        assert_eq!(node.span.end_column, Some(6));
    }

    #[test]
    fn module_roots_do_not_move() {
        let mut node = SpanNode::new(SpanKind::Module, SourceSpan::none());
        shift_spans(&mut node, &anchor(100, 100));
        assert_eq!(node.span, SourceSpan::none());
    }
}
