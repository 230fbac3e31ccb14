//! The cell compiler: parse, classify, analyze, split, remap, and lower a
//! cell's source into a dataflow-annotated [`CompiledCell`].

use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, OnceLock};

use ahash::RandomState;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use ruff_python_ast::{Expr, ModModule, Stmt};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextSize};

use crate::cell::{CellId, CompiledCell, ImportWorkspace};
use crate::code::{self, CodeObject, CodeProgram, CompileFlags};
use crate::error::ParseError;
use crate::linecache::LineCache;
use crate::remap::{self, SourcePosition};
use crate::rewrite::TestRewriter;
use crate::span::{LineIndex, SourceSpan};
use crate::variables::is_local;
use crate::visitor::{self, ImportData, Language, VariableData};

/// Hash of a cell's source text, used as its cache key.
///
/// The hasher state is process-wide so identical text always produces an
/// identical key within a process, regardless of which compiler instance
/// computed it.
#[must_use]
pub fn code_key(code: &str) -> u64 {
    static KEY_STATE: LazyLock<RandomState> = LazyLock::new(RandomState::new);
    KEY_STATE.hash_one(code)
}

/// Process-scoped directory for synthetic cell filenames. Never created on
/// disk: the paths exist only as identifiers for the debug line cache.
fn cell_tmpdir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| std::env::temp_dir().join(format!("koru-{}", std::process::id())))
}

/// Synthetic filename encoding a cell id, for cells with no backing file.
#[must_use]
pub fn get_filename(cell_id: &CellId, suffix: &str) -> String {
    let basename = format!("__koru__cell_{cell_id}_{suffix}.py");
    cell_tmpdir().join(basename).to_string_lossy().into_owned()
}

/// Recovers the cell id encoded in a synthetic filename.
#[must_use]
pub fn cell_id_from_filename(filename: &str) -> Option<CellId> {
    static PATTERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"__koru__cell_(.*?)_").expect("filename pattern is valid"));
    PATTERN
        .captures(filename)
        .map(|captures| CellId::new(&captures[1]))
}

/// Parses a cell body, converting parser diagnostics into [`ParseError`]s
/// with cell-local spans.
pub(crate) fn parse_checked(code: &str, index: &LineIndex) -> Result<ModModule, ParseError> {
    let parsed = parse_module(code)
        .map_err(|error| ParseError::syntax(error.to_string(), Some(index.span(error.range()))))?;
    Ok(parsed.into_syntax())
}

/// True if the expression statement ending at `end` is terminated by a
/// semicolon. Only whitespace, comments, and `;` can follow the final
/// expression, so a forward scan over that tail is equivalent to scanning
/// tokens backwards from the end.
fn ends_with_semicolon(code: &str, end: TextSize) -> bool {
    let mut rest = code[end.to_usize()..].chars();
    while let Some(c) = rest.next() {
        match c {
            ';' => return true,
            '#' => {
                for c in rest.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() || c == '\\' => {}
            _ => return false,
        }
    }
    false
}

/// True if the module holds only test content: every top-level statement a
/// function/class whose name starts with the test prefix, or a top-level
/// bare return (a function body captured as a cell).
fn contains_only_tests(module: &ModModule) -> bool {
    for stmt in &module.body {
        match stmt {
            Stmt::Return(_) => return true,
            Stmt::FunctionDef(func) => {
                if !func
                    .name
                    .as_str()
                    .to_ascii_lowercase()
                    .starts_with(crate::cell::TEST_NAME_PREFIX)
                {
                    return false;
                }
            }
            Stmt::ClassDef(class) => {
                if !class
                    .name
                    .as_str()
                    .to_ascii_lowercase()
                    .starts_with(crate::cell::TEST_NAME_PREFIX)
                {
                    return false;
                }
            }
            _ => return false,
        }
    }
    !module.body.is_empty()
}

/// Per-compilation inputs beyond the source text itself.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions<'a> {
    /// Anchor re-pointing diagnostics at the cell's true file location.
    pub source_position: Option<SourcePosition>,
    /// Import provenance from a prior compilation of the same logical cell.
    pub carried_imports: Option<&'a [ImportData]>,
    /// Force assertion rewriting even for non-test cells.
    pub test_rewrite: bool,
}

/// Compiles cell source into [`CompiledCell`] records.
///
/// Carries the two injected collaborators compilation writes to: the debug
/// line cache (defaults to the process-wide one) and the optional
/// test-assertion rewriter. Compilation itself is synchronous and CPU-bound;
/// concurrent use from multiple threads is safe.
#[derive(Default)]
pub struct CellCompiler {
    line_cache: Option<Arc<LineCache>>,
    rewriter: Option<Box<dyn TestRewriter>>,
}

struct TrailingValue {
    /// The detached expression, or `None` for the synthesized no-value
    /// evaluator.
    payload: Option<Box<Expr>>,
    /// The line the evaluator is anchored at.
    line: u32,
}

impl CellCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitutes an isolated line cache (tests, embedded runtimes).
    #[must_use]
    pub fn with_line_cache(mut self, cache: Arc<LineCache>) -> Self {
        self.line_cache = Some(cache);
        self
    }

    /// Supplies the assertion-rewriting capability.
    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Box<dyn TestRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub(crate) fn cache(&self) -> &LineCache {
        self.line_cache.as_deref().unwrap_or_else(|| LineCache::global())
    }

    /// Compiles with default options.
    pub fn compile(&self, code: &str, cell_id: &CellId) -> Result<CompiledCell, ParseError> {
        self.compile_with(code, cell_id, CompileOptions::default())
    }

    /// Compiles a cell's source text.
    ///
    /// Parse errors are fatal and propagate verbatim. Every other step
    /// succeeds for syntactically valid input; assertion-rewrite failures in
    /// particular are logged and swallowed. Whitespace/comment-only source
    /// is a valid, inert cell, not an error.
    pub fn compile_with(
        &self,
        code: &str,
        cell_id: &CellId,
        options: CompileOptions,
    ) -> Result<CompiledCell, ParseError> {
        // Some remote frontends send non-breaking spaces in place of
        // spaces, which read fine and fail to parse.
        let code = code.replace('\u{00a0}', " ");
        let index = LineIndex::new(&code);
        let mut module = parse_checked(&code, &index)?;

        if module.body.is_empty() {
            return Ok(CompiledCell {
                key: code_key(""),
                code,
                tree: module,
                defs: IndexSet::new(),
                refs: IndexSet::new(),
                temporaries: IndexSet::new(),
                variable_data: IndexMap::new(),
                deleted_refs: IndexSet::new(),
                language: Language::Python,
                import_workspace: ImportWorkspace::default(),
                body: None,
                last_expr: None,
                cell_id: cell_id.clone(),
                test: false,
            });
        }

        let is_test = contains_only_tests(&module);
        let is_import_block = module
            .body
            .iter()
            .all(|stmt| matches!(stmt, Stmt::Import(_) | Stmt::ImportFrom(_)));

        let analysis = visitor::analyze(&module);
        let original_module = module.clone();

        // Detach the trailing expression when it is the cell's value; a
        // trailing semicolon (trivia aside) suppresses it.
        let final_range = module.body.last().expect("body is non-empty").range();
        let (_, final_end_col) = index.location(final_range.end());
        let trailing = if matches!(module.body.last(), Some(Stmt::Expr(_)))
            && !ends_with_semicolon(&code, final_range.end())
        {
            let Some(Stmt::Expr(stmt)) = module.body.pop() else {
                unreachable!("last statement matched as an expression");
            };
            let (line, _) = index.location(final_range.start());
            TrailingValue {
                payload: Some(stmt.value),
                line,
            }
        } else {
            TrailingValue {
                payload: None,
                line: code.lines().count() as u32 + 1,
            }
        };
        // Promotion to a standalone evaluable unit loses the original
        // column information; restore it from the final statement.
        let expr_root_span = SourceSpan {
            line: Some(trailing.line),
            column: Some(final_end_col),
            end_line: None,
            end_column: Some(final_end_col),
        };

        let mut body_spans = code::lower_statements(&module.body, &index, &code);
        let mut expr_spans = code::lower_expression(trailing.payload.as_deref(), expr_root_span, &index);

        let filename = match &options.source_position {
            Some(position) => {
                // Real backing file: shift both artifacts' positions so
                // tracebacks and debuggers resolve to the user's source.
                remap::shift_spans(&mut body_spans, position);
                remap::shift_spans(&mut expr_spans, position);
                position.filename.clone()
            }
            None => {
                let filename = get_filename(cell_id, "");
                self.cache().insert(&filename, &code);
                filename
            }
        };

        if is_test || options.test_rewrite {
            match &self.rewriter {
                Some(rewriter) => {
                    if let Err(error) = rewriter.rewrite_asserts(&mut module, &code, &filename) {
                        tracing::warn!(
                            "assertion rewriting failed, compiling the unmodified tree: {error}"
                        );
                    }
                }
                None => {
                    tracing::warn!("no assertion rewriter available, skipping assertion rewriting");
                }
            }
        }

        let flags = CompileFlags::default();
        let body = CodeObject::compile(
            CodeProgram::Statements(std::mem::take(&mut module.body).into_iter().collect()),
            &filename,
            flags,
            body_spans,
        );
        let last_expr = CodeObject::compile(
            CodeProgram::Expression(trailing.payload),
            &filename,
            flags,
            expr_spans,
        );

        // Partition definitions into externally-visible names and
        // cell-private temporaries; metadata is projected for the visible
        // subset only.
        let mut defs = IndexSet::new();
        let mut temporaries = IndexSet::new();
        for name in analysis.defs {
            if is_local(&name) {
                temporaries.insert(name);
            } else {
                defs.insert(name);
            }
        }
        let mut refs = analysis.refs;
        refs.retain(|name| !temporaries.contains(name));
        let variable_data: IndexMap<String, Vec<VariableData>> = analysis
            .variable_data
            .into_iter()
            .filter(|(name, _)| defs.contains(name))
            .collect();

        // For an import cell recompiled against prior provenance, recognize
        // which definitions continue imports that were already present —
        // matched by import descriptor, not by name.
        let mut imported_defs = IndexSet::new();
        if is_import_block && let Some(carried) = options.carried_imports {
            for data in variable_data.values() {
                for datum in data {
                    let Some(import_data) = &datum.import_data else {
                        continue;
                    };
                    if carried.iter().any(|previous| previous == import_data) {
                        imported_defs.insert(import_data.definition.clone());
                    }
                }
            }
        }

        Ok(CompiledCell {
            // Keyed by the user's code, never post-processed text, so
            // identical edits always produce identical cache keys.
            key: code_key(&code),
            code,
            tree: original_module,
            defs,
            refs,
            temporaries,
            variable_data,
            deleted_refs: analysis.deleted_refs,
            language: analysis.language,
            import_workspace: ImportWorkspace {
                is_import_block,
                imported_defs,
            },
            body: Some(body),
            last_expr: Some(last_expr),
            cell_id: cell_id.clone(),
            test: is_test,
        })
    }
}
