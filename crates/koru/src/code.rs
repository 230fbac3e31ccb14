//! Executable artifacts produced by the cell compiler.
//!
//! A compiled cell yields two independent artifacts: its statement body and
//! its trailing-expression evaluator. Each carries the filename tracebacks
//! should report, the compile flags it was built under, and a span tree — a
//! mirror of every location-bearing syntax node, in anchor-file coordinates —
//! that the executor and debuggers resolve positions against. The syntax
//! itself is handed over as parsed ruff AST; execution is the runtime's
//! concern, not this crate's.

use std::sync::LazyLock;

use regex::Regex;
use ruff_python_ast::visitor::{self, Visitor};
use ruff_python_ast::{Expr, Stmt};
use ruff_text_size::Ranged;

use crate::remap::{SpanKind, SpanNode};
use crate::span::{LineIndex, SourceSpan};

/// Execution mode of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMode {
    /// Run statements for their effects.
    Exec,
    /// Evaluate a single expression to a value.
    Eval,
}

/// Compile flags shared by both artifacts of a cell.
///
/// Flags are never inherited from the host environment; a cell's own
/// directives (future-style pragmas) must be explicit and local to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileFlags {
    /// Permit `await` at the top level of the cell.
    pub allow_top_level_await: bool,
}

impl Default for CompileFlags {
    fn default() -> Self {
        Self {
            allow_top_level_await: true,
        }
    }
}

/// The executable payload of an artifact.
#[derive(Debug, Clone)]
pub enum CodeProgram {
    /// A statement body (exec mode).
    Statements(Vec<Stmt>),
    /// A trailing-expression evaluator (eval mode). A `None` payload is the
    /// synthesized no-value evaluator: cells ending in a statement or a
    /// semicolon-suppressed expression still yield a well-defined result.
    Expression(Option<Box<Expr>>),
}

/// One compiled executable artifact.
#[derive(Debug, Clone)]
pub struct CodeObject {
    filename: String,
    flags: CompileFlags,
    program: CodeProgram,
    spans: SpanNode,
}

impl CodeObject {
    /// Assembles an artifact from a program and its (already remapped) span
    /// tree.
    pub(crate) fn compile(
        program: CodeProgram,
        filename: &str,
        flags: CompileFlags,
        spans: SpanNode,
    ) -> Self {
        Self {
            filename: filename.to_owned(),
            flags,
            program,
            spans,
        }
    }

    /// The filename tracebacks report for this artifact.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn flags(&self) -> CompileFlags {
        self.flags
    }

    #[must_use]
    pub fn mode(&self) -> CodeMode {
        match self.program {
            CodeProgram::Statements(_) => CodeMode::Exec,
            CodeProgram::Expression(_) => CodeMode::Eval,
        }
    }

    #[must_use]
    pub fn program(&self) -> &CodeProgram {
        &self.program
    }

    /// The artifact's location tree, in the coordinates of [`Self::filename`].
    #[must_use]
    pub fn spans(&self) -> &SpanNode {
        &self.spans
    }
}

/// Mirrors a statement body into a span tree rooted at a position-less
/// module node. Pragma comments (`# type:`) become line-only children so
/// remapping can shift them like the syntax they annotate.
pub(crate) fn lower_statements(stmts: &[Stmt], index: &LineIndex, code: &str) -> SpanNode {
    let mut lowerer = SpanLowerer::new(index);
    for stmt in stmts {
        lowerer.visit_stmt(stmt);
    }
    let mut root = SpanNode::new(SpanKind::Module, SourceSpan::none());
    root.children = lowerer.finish();
    for line in pragma_lines(code) {
        root.children
            .push(SpanNode::new(SpanKind::Pragma, SourceSpan::line_only(line)));
    }
    root
}

/// Mirrors a trailing expression into a span tree rooted at the given span.
/// The root span is supplied by the compiler: promotion to a standalone
/// evaluable unit loses the original column information, and the compiler
/// restores it from the final statement before lowering.
pub(crate) fn lower_expression(
    expr: Option<&Expr>,
    root_span: SourceSpan,
    index: &LineIndex,
) -> SpanNode {
    let mut root = SpanNode::new(SpanKind::Expression, root_span);
    if let Some(expr) = expr {
        let mut lowerer = SpanLowerer::new(index);
        lowerer.visit_expr(expr);
        root.children = lowerer.finish();
    }
    root
}

struct SpanLowerer<'a> {
    index: &'a LineIndex,
    stack: Vec<SpanNode>,
    finished: Vec<SpanNode>,
}

impl<'a> SpanLowerer<'a> {
    fn new(index: &'a LineIndex) -> Self {
        Self {
            index,
            stack: Vec::new(),
            finished: Vec::new(),
        }
    }

    fn enter(&mut self, kind: SpanKind, span: SourceSpan) {
        self.stack.push(SpanNode::new(kind, span));
    }

    fn exit(&mut self) {
        let node = self.stack.pop().expect("enter/exit calls are balanced");
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.finished.push(node),
        }
    }

    fn finish(self) -> Vec<SpanNode> {
        debug_assert!(self.stack.is_empty());
        self.finished
    }
}

impl<'a> Visitor<'a> for SpanLowerer<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        self.enter(SpanKind::Statement, self.index.span(stmt.range()));
        visitor::walk_stmt(self, stmt);
        self.exit();
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        self.enter(SpanKind::Expression, self.index.span(expr.range()));
        visitor::walk_expr(self, expr);
        self.exit();
    }
}

/// 1-indexed lines carrying a `# type:` comment. These annotate syntax
/// without being part of it, mirroring how the AST carries line-only
/// type-comment nodes.
fn pragma_lines(code: &str) -> Vec<u32> {
    static TYPE_COMMENT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"#\s*type:").expect("pragma pattern is valid"));
    code.lines()
        .enumerate()
        .filter(|(_, line)| TYPE_COMMENT.is_match(line))
        .map(|(i, _)| i as u32 + 1)
        .collect()
}
