//! Cell extraction: recovering a cell's exact source text from the surfaces
//! users author cells in.
//!
//! The original runtime recovered cell text from live stack frames and
//! function objects. There is no such reflection here; callers register what
//! they know instead. Every strategy takes a *source descriptor*: the
//! enclosing source text, the 1-indexed line that text starts at in its
//! backing file, and the file's identity. Extraction then works purely on
//! the parsed text.

use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;

use crate::compile::parse_checked;
use crate::error::{CellError, ExtractionError};
use crate::span::LineIndex;
use crate::visitor::parameter_names;

/// Sentinel module-spec name under which the notebook application runs its
/// own cells.
pub const APP_SPEC_NAME: &str = "koru_app";

/// How the module containing a cell is being executed.
///
/// Determines whether compiled cells are anchored to their real file. Code
/// running as the notebook application gets no anchor (its cells are managed
/// by the runtime and would leak internal paths); everything else — a plain
/// script, or dynamically executed code with no module spec at all — is a
/// script and anchors normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Script,
    App,
}

impl SourceMode {
    /// Classifies a module by its import-spec name. No spec (dynamic code)
    /// is a script; only the application sentinel disables anchoring.
    #[must_use]
    pub fn from_spec_name(spec_name: Option<&str>) -> Self {
        match spec_name {
            Some(APP_SPEC_NAME) => Self::App,
            _ => Self::Script,
        }
    }
}

/// Identity of the module a cell's source lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOrigin {
    /// Absolute path of the backing file.
    pub filename: String,
    pub mode: SourceMode,
}

/// Descriptor for context-block extraction: the source of the scope that
/// entered a lexical block, plus where the block was entered.
///
/// For a block containing only comments the registered source must carry the
/// parser-mandated `pass` placeholder; the extractor excludes it from the
/// recovered span.
#[derive(Debug, Clone)]
pub struct BlockSource {
    /// Source of the enclosing function or module.
    pub source: String,
    /// 1-indexed line `source` starts at in its file; 0 for whole-module
    /// source.
    pub first_line: u32,
    /// 1-indexed file line of the block statement itself.
    pub entry_line: u32,
    pub origin: ModuleOrigin,
}

/// Descriptor for declaration-based extraction: the full text of a decorated
/// `def` or `class`.
#[derive(Debug, Clone)]
pub struct DeclSource {
    /// Source of the declaration, decorators included.
    pub source: String,
    /// 1-indexed line `source` starts at in its file.
    pub first_line: u32,
    pub origin: ModuleOrigin,
}

/// What kind of declaration a top-level cell wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Class,
}

/// Result of context-block extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    /// De-indented cell text.
    pub code: String,
    /// Line offset for anchoring (the block body's first line minus one).
    pub lineno: u32,
    /// Column offset for anchoring (the block body's indent).
    pub col_offset: u32,
}

/// Result of declaration extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDecl {
    /// The declaration text with its marker decorator scrubbed.
    pub code: String,
    pub name: String,
    pub kind: DeclKind,
    /// Line offset for anchoring.
    pub lineno: u32,
}

/// Result of decorated-function extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFn {
    /// The function's de-indented body text.
    pub code: String,
    pub name: String,
    /// Line offset for anchoring.
    pub lineno: u32,
    /// Column offset for anchoring (the body's indent).
    pub col_offset: u32,
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
}

/// Context-block strategy: locate the block entered at `entry_line` and
/// recover its body as cell text.
pub fn extract_block(block: &BlockSource) -> Result<ExtractedBlock, CellError> {
    let source = dedent(&block.source);
    let index = LineIndex::new(&source);
    let module = parse_checked(&source, &index)?;

    // When the source was recovered from inside a function (e.g. under a
    // test harness), entry lines are file-relative and need re-basing onto
    // the recovered source.
    let mut entry_line = i64::from(block.entry_line);
    if block.first_line > 0 {
        entry_line += 1 - i64::from(block.first_line);
    }
    let entry_line = u32::try_from(entry_line)
        .ok()
        .filter(|line| *line >= 1)
        .ok_or(ExtractionError::BlockNotFound {
            entry_line: block.entry_line,
        })?;

    let with_stmt = find_with_block(&module.body, entry_line, &index)
        .ok_or(ExtractionError::BlockNotFound { entry_line })?;

    let start = with_stmt
        .body
        .first()
        .ok_or(ExtractionError::EmptyBody)?;
    let end = with_stmt.body.last().ok_or(ExtractionError::EmptyBody)?;
    let start_span = index.span(start.range());
    let col_offset = start_span.column.unwrap_or(0);
    let mut end_line = index.span(end.range()).end_line.unwrap_or(0);

    let lines: Vec<&str> = source.lines().collect();
    // A comment-only block carries a placeholder `pass` as its sole
    // statement; it is not user code and is excluded from the span.
    if with_stmt.body.len() == 1
        && end_line > 0
        && matches!(start, Stmt::Pass(_))
        && lines
            .get(end_line as usize - 1)
            .is_some_and(|line| line.trim() == "pass")
    {
        end_line -= 1;
    }

    let start_idx = entry_line as usize;
    let end_idx = (end_line as usize).min(lines.len());
    let code = if start_idx >= end_idx {
        String::new()
    } else {
        dedent(&lines[start_idx..end_idx].join("\n"))
            .trim_end()
            .to_owned()
    };

    Ok(ExtractedBlock {
        code,
        lineno: start_span.line.unwrap_or(1).saturating_sub(1),
        col_offset,
    })
}

/// Declaration strategy: scrub the leading decorator off a decorated
/// `def`/`class` and keep everything after it as the cell body.
pub fn extract_declaration(decl: &DeclSource) -> Result<ExtractedDecl, CellError> {
    let source = dedent(&decl.source);
    let index = LineIndex::new(&source);
    let module = parse_checked(&source, &index)?;

    let first = module.body.first().ok_or(ExtractionError::EmptyBody)?;
    let (name, decorators, kind) = match first {
        Stmt::FunctionDef(func) => (func.name.as_str(), &func.decorator_list, DeclKind::Function),
        Stmt::ClassDef(class) => (class.name.as_str(), &class.decorator_list, DeclKind::Class),
        _ => return Err(ExtractionError::MissingDecorator.into()),
    };
    let decorator = decorators.first().ok_or(ExtractionError::MissingDecorator)?;
    let decorator_end = index.span(decorator.range()).end_line.unwrap_or(0);

    // The text is sliced rather than unparsed so comments survive.
    let lines: Vec<&str> = source.lines().collect();
    let rest = lines
        .get(decorator_end as usize..)
        .unwrap_or_default()
        .join("\n");
    let code = dedent(&rest).trim().to_owned();

    Ok(ExtractedDecl {
        code,
        name: name.to_owned(),
        kind,
        lineno: (decl.first_line + decorator_end).saturating_sub(1),
    })
}

/// Decorated-function strategy: hand the body of a cell-marked function to
/// the compiler. The signature and return annotation are recorded, never
/// analyzed for dataflow.
pub fn extract_cell_function(func: &DeclSource) -> Result<ExtractedFn, CellError> {
    let source = dedent(&func.source);
    let index = LineIndex::new(&source);
    let module = parse_checked(&source, &index)?;

    let first = module.body.first().ok_or(ExtractionError::EmptyBody)?;
    let Stmt::FunctionDef(def) = first else {
        return Err(ExtractionError::MissingDecorator.into());
    };
    if !def
        .decorator_list
        .iter()
        .any(|decorator| is_cell_marker(&decorator.expression))
    {
        return Err(ExtractionError::MissingDecorator.into());
    }

    let start = def.body.first().ok_or(ExtractionError::EmptyBody)?;
    let end = def.body.last().ok_or(ExtractionError::EmptyBody)?;
    let start_span = index.span(start.range());
    let first_body_line = start_span.line.unwrap_or(1);
    let end_line = index.span(end.range()).end_line.unwrap_or(first_body_line);

    let lines: Vec<&str> = source.lines().collect();
    let start_idx = first_body_line.saturating_sub(1) as usize;
    let end_idx = (end_line as usize).min(lines.len());
    let code = dedent(&lines[start_idx..end_idx].join("\n"))
        .trim_end()
        .to_owned();

    Ok(ExtractedFn {
        code,
        name: def.name.as_str().to_owned(),
        lineno: (func.first_line + first_body_line).saturating_sub(2),
        col_offset: start_span.column.unwrap_or(0),
        params: parameter_names(&def.parameters),
    })
}

/// True for the decorator expression that marks a function as a cell:
/// `cell`, `app.cell`, or either of those called with arguments.
fn is_cell_marker(expr: &Expr) -> bool {
    match expr {
        Expr::Call(call) => is_cell_marker(&call.func),
        Expr::Attribute(attribute) => attribute.attr.as_str() == "cell",
        Expr::Name(name) => name.id.as_str() == "cell",
        _ => false,
    }
}

/// Finds the innermost `with` block whose span contains `line`, recursing
/// through compound statements so blocks nested under a harness function are
/// still found.
fn find_with_block<'a>(
    stmts: &'a [Stmt],
    line: u32,
    index: &LineIndex,
) -> Option<&'a ast::StmtWith> {
    for stmt in stmts {
        let span = index.span(stmt.range());
        let (Some(start), Some(end)) = (span.line, span.end_line) else {
            continue;
        };
        if line < start || line > end {
            continue;
        }
        let found = match stmt {
            Stmt::With(with_stmt) => {
                find_with_block(&with_stmt.body, line, index).or(Some(with_stmt))
            }
            Stmt::FunctionDef(func) => find_with_block(&func.body, line, index),
            Stmt::ClassDef(class) => find_with_block(&class.body, line, index),
            Stmt::If(if_stmt) => find_with_block(&if_stmt.body, line, index).or_else(|| {
                if_stmt
                    .elif_else_clauses
                    .iter()
                    .find_map(|clause| find_with_block(&clause.body, line, index))
            }),
            Stmt::For(for_stmt) => find_with_block(&for_stmt.body, line, index)
                .or_else(|| find_with_block(&for_stmt.orelse, line, index)),
            Stmt::While(while_stmt) => find_with_block(&while_stmt.body, line, index)
                .or_else(|| find_with_block(&while_stmt.orelse, line, index)),
            Stmt::Try(try_stmt) => find_with_block(&try_stmt.body, line, index)
                .or_else(|| {
                    try_stmt.handlers.iter().find_map(|handler| {
                        let ast::ExceptHandler::ExceptHandler(handler) = handler;
                        find_with_block(&handler.body, line, index)
                    })
                })
                .or_else(|| find_with_block(&try_stmt.orelse, line, index))
                .or_else(|| find_with_block(&try_stmt.finalbody, line, index)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Strips the longest common leading whitespace from every non-blank line.
pub(crate) fn dedent(text: &str) -> String {
    let mut prefix: Option<&str> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        prefix = Some(match prefix {
            None => indent,
            Some(current) => common_prefix(current, indent),
        });
        if prefix == Some("") {
            break;
        }
    }
    let prefix = prefix.unwrap_or("");
    if prefix.is_empty() {
        return text.to_owned();
    }
    let mut out: String = text
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.strip_prefix(prefix).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    &a[..len]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn origin() -> ModuleOrigin {
        ModuleOrigin {
            filename: "/nb/app.py".to_owned(),
            mode: SourceMode::Script,
        }
    }

    #[test]
    fn dedent_strips_common_indent() {
        assert_eq!(dedent("    a\n        b\n"), "a\n    b\n");
        assert_eq!(dedent("a\n    b\n"), "a\n    b\n");
        assert_eq!(dedent("\n    a\n\n    b"), "\na\n\nb");
    }

    #[test]
    fn spec_name_policy() {
        assert_eq!(SourceMode::from_spec_name(Some("koru_app")), SourceMode::App);
        assert_eq!(SourceMode::from_spec_name(Some("my_nb")), SourceMode::Script);
        assert_eq!(SourceMode::from_spec_name(None), SourceMode::Script);
    }

    #[test]
    fn block_extraction_recovers_body_text() {
        let block = BlockSource {
            source: "import app\n\nwith app.setup:\n    import os\n    x = 1\n".to_owned(),
            first_line: 0,
            entry_line: 3,
            origin: origin(),
        };
        let extracted = extract_block(&block).expect("block extracts");
        assert_eq!(extracted.code, "import os\nx = 1");
        // Anchor points one line above the first body statement.
        assert_eq!(extracted.lineno, 3);
        assert_eq!(extracted.col_offset, 4);
    }

    #[test]
    fn block_extraction_rebases_nested_entry_lines() {
        // Source recovered from a function starting at file line 10; the
        // block is entered at file line 11.
        let block = BlockSource {
            source: "def harness():\n    with setup:\n        x = 1\n".to_owned(),
            first_line: 10,
            entry_line: 11,
            origin: origin(),
        };
        let extracted = extract_block(&block).expect("block extracts");
        assert_eq!(extracted.code, "x = 1");
    }

    #[test]
    fn comment_only_block_excludes_placeholder() {
        let block = BlockSource {
            source: "with setup:\n    # nothing yet\n    pass\n".to_owned(),
            first_line: 0,
            entry_line: 1,
            origin: origin(),
        };
        let extracted = extract_block(&block).expect("block extracts");
        assert_eq!(extracted.code, "# nothing yet");
    }

    #[test]
    fn missing_block_is_an_extraction_error() {
        let block = BlockSource {
            source: "x = 1\n".to_owned(),
            first_line: 0,
            entry_line: 1,
            origin: origin(),
        };
        let err = extract_block(&block).expect_err("no block to find");
        assert!(matches!(
            err,
            CellError::Extraction(ExtractionError::BlockNotFound { .. })
        ));
    }

    #[test]
    fn declaration_extraction_scrubs_the_decorator() {
        let decl = DeclSource {
            source: "@app.function\ndef load(path):\n    return path\n".to_owned(),
            first_line: 5,
            origin: origin(),
        };
        let extracted = extract_declaration(&decl).expect("declaration extracts");
        assert_eq!(extracted.code, "def load(path):\n    return path");
        assert_eq!(extracted.name, "load");
        assert_eq!(extracted.kind, DeclKind::Function);
        assert_eq!(extracted.lineno, 5);
    }

    #[test]
    fn undecorated_declaration_is_an_extraction_error() {
        let decl = DeclSource {
            source: "def load(path):\n    return path\n".to_owned(),
            first_line: 1,
            origin: origin(),
        };
        let err = extract_declaration(&decl).expect_err("no decorator");
        assert!(matches!(
            err,
            CellError::Extraction(ExtractionError::MissingDecorator)
        ));
    }

    #[test]
    fn class_declarations_extract_too() {
        let decl = DeclSource {
            source: "@app.class_definition\nclass Config:\n    debug = False\n".to_owned(),
            first_line: 1,
            origin: origin(),
        };
        let extracted = extract_declaration(&decl).expect("class extracts");
        assert_eq!(extracted.kind, DeclKind::Class);
        assert_eq!(extracted.code, "class Config:\n    debug = False");
    }

    #[test]
    fn function_extraction_takes_the_body_only() {
        let func = DeclSource {
            source: "@app.cell\ndef compute(x, y):\n    total = x + y\n    total\n".to_owned(),
            first_line: 1,
            origin: origin(),
        };
        let extracted = extract_cell_function(&func).expect("function extracts");
        assert_eq!(extracted.code, "total = x + y\ntotal");
        assert_eq!(extracted.name, "compute");
        assert_eq!(extracted.params, vec!["x".to_owned(), "y".to_owned()]);
        assert_eq!(extracted.col_offset, 4);
        // Cell line 1 maps to file line 3.
        assert_eq!(extracted.lineno, 2);
    }

    #[test]
    fn called_cell_marker_is_recognized() {
        let func = DeclSource {
            source: "@app.cell(hide_code=True)\ndef show():\n    1\n".to_owned(),
            first_line: 1,
            origin: origin(),
        };
        assert!(extract_cell_function(&func).is_ok());
    }

    #[test]
    fn unmarked_function_is_an_extraction_error() {
        let func = DeclSource {
            source: "@app.function\ndef compute():\n    return 1\n".to_owned(),
            first_line: 1,
            origin: origin(),
        };
        let err = extract_cell_function(&func).expect_err("wrong decorator");
        assert!(matches!(
            err,
            CellError::Extraction(ExtractionError::MissingDecorator)
        ));
    }
}
