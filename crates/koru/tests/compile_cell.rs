use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use koru::{
    CellCompiler, CellId, CodeMode, CodeProgram, CompileOptions, ImportData, Language, LineCache,
    RewriteError, SourcePosition, SpanNode, TestRewriter, cell_id_from_filename, code_key,
};
use pretty_assertions::assert_eq;

fn compile(code: &str) -> koru::CompiledCell {
    CellCompiler::new()
        .compile(code, &CellId::new("0"))
        .expect("cell should compile")
}

fn names(set: &indexmap::IndexSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

fn span_lines(spans: &SpanNode) -> Vec<u32> {
    let mut lines = Vec::new();
    spans.for_each(&mut |node| {
        if let Some(line) = node.span.line {
            lines.push(line);
        }
    });
    lines
}

#[test]
fn compilation_is_idempotent() {
    let first = compile("x = 1\ny = x + 1\n");
    let second = compile("x = 1\ny = x + 1\n");
    assert_eq!(first.key, second.key);
    assert_eq!(first.defs, second.defs);
    assert_eq!(first.refs, second.refs);
    assert_eq!(first.temporaries, second.temporaries);
}

#[test]
fn empty_cells_are_inert() {
    for code in ["", "   \n", "# only a comment\n", "\n\n# a\n# b\n"] {
        let cell = compile(code);
        assert!(cell.is_inert(), "{code:?} should be inert");
        assert!(cell.defs.is_empty());
        assert!(cell.refs.is_empty());
        assert!(cell.temporaries.is_empty());
        assert!(cell.body.is_none());
        assert!(cell.last_expr.is_none());
        assert_eq!(cell.key, code_key(""));
    }
}

#[test]
fn assignments_define_without_references() {
    let cell = compile("x = 1\ny = x + 1");
    assert_eq!(names(&cell.defs), vec!["x", "y"]);
    assert!(cell.refs.is_empty());
    // The cell ends in a statement: its value evaluator is the synthesized
    // no-value expression.
    let last_expr = cell.last_expr.as_ref().expect("evaluator present");
    assert!(matches!(last_expr.program(), CodeProgram::Expression(None)));
    // Anchored one line past the end of the source.
    assert_eq!(last_expr.spans().span.line, Some(3));
}

#[test]
fn trailing_expression_becomes_the_value() {
    let cell = compile("x = 1\nx + 1");
    assert_eq!(names(&cell.defs), vec!["x"]);
    let last_expr = cell.last_expr.as_ref().expect("evaluator present");
    assert_eq!(last_expr.mode(), CodeMode::Eval);
    let CodeProgram::Expression(Some(expr)) = last_expr.program() else {
        panic!("expected a detached trailing expression");
    };
    assert!(matches!(**expr, ruff_python_ast::Expr::BinOp(_)));
    // The detached expression keeps its own line.
    assert_eq!(last_expr.spans().span.line, Some(2));
    // The statement body no longer contains the trailing expression.
    let body = cell.body.as_ref().expect("body present");
    let CodeProgram::Statements(stmts) = body.program() else {
        panic!("expected a statement body");
    };
    assert_eq!(stmts.len(), 1);
}

#[test]
fn semicolon_suppresses_the_trailing_value() {
    let cell = compile("x = 1\nx + 1;");
    let last_expr = cell.last_expr.as_ref().expect("evaluator present");
    assert!(matches!(last_expr.program(), CodeProgram::Expression(None)));
    let body = cell.body.as_ref().expect("body present");
    let CodeProgram::Statements(stmts) = body.program() else {
        panic!("expected a statement body");
    };
    assert_eq!(stmts.len(), 2);
}

#[test]
fn semicolon_then_comment_still_suppresses() {
    let cell = compile("x = 1\nx + 1 ;  # hide the value");
    let last_expr = cell.last_expr.as_ref().expect("evaluator present");
    assert!(matches!(last_expr.program(), CodeProgram::Expression(None)));
}

#[test]
fn underscore_names_are_temporaries() {
    let cell = compile("_hidden = 1\nshown = _hidden + 1");
    assert_eq!(names(&cell.defs), vec!["shown"]);
    assert_eq!(names(&cell.temporaries), vec!["_hidden"]);
    assert!(cell.refs.is_empty());
    // Metadata is projected for externally-visible names only.
    assert!(cell.variable_data.contains_key("shown"));
    assert!(!cell.variable_data.contains_key("_hidden"));
}

#[test]
fn import_cells_carry_imports_forward() {
    let compiler = CellCompiler::new();
    let cell_id = CellId::new("imports");
    let first = compiler
        .compile("import os", &cell_id)
        .expect("import cell compiles");
    assert!(first.import_workspace.is_import_block);
    assert!(first.import_workspace.imported_defs.is_empty());

    let carried: Vec<ImportData> = first
        .variable_data
        .values()
        .flatten()
        .filter_map(|data| data.import_data.clone())
        .collect();

    let second = compiler
        .compile_with(
            "import os",
            &cell_id,
            CompileOptions {
                carried_imports: Some(&carried),
                ..CompileOptions::default()
            },
        )
        .expect("import cell recompiles");
    assert!(second.import_workspace.is_import_block);
    assert_eq!(names(&second.import_workspace.imported_defs), vec!["os"]);
}

#[test]
fn carried_imports_match_by_descriptor_not_name() {
    // A prior `os` binding that came from a different module is not the
    // same import, even though the name matches.
    let carried = vec![ImportData {
        definition: "os".to_owned(),
        module: "fake_os".to_owned(),
        imported_symbol: None,
        import_level: 0,
    }];
    let cell = CellCompiler::new()
        .compile_with(
            "import os",
            &CellId::new("imports"),
            CompileOptions {
                carried_imports: Some(&carried),
                ..CompileOptions::default()
            },
        )
        .expect("import cell compiles");
    assert!(cell.import_workspace.imported_defs.is_empty());
}

#[test]
fn non_import_cells_have_no_import_workspace_entries() {
    let cell = compile("import os\nx = 1");
    assert!(!cell.import_workspace.is_import_block);
}

#[test]
fn anchors_shift_every_reported_location() {
    let code = "x = 1\ny = (\n    x + 1\n)";
    let compiler = CellCompiler::new();
    let plain = compiler
        .compile(code, &CellId::new("a"))
        .expect("compiles unanchored");
    let anchored = compiler
        .compile_with(
            code,
            &CellId::new("a"),
            CompileOptions {
                source_position: Some(SourcePosition {
                    filename: "/nb/app.py".to_owned(),
                    lineno: 12,
                    col_offset: 4,
                }),
                ..CompileOptions::default()
            },
        )
        .expect("compiles anchored");

    let plain_body = plain.body.as_ref().expect("body present");
    let anchored_body = anchored.body.as_ref().expect("body present");
    assert_eq!(anchored_body.filename(), "/nb/app.py");

    let plain_lines = span_lines(plain_body.spans());
    let anchored_lines = span_lines(anchored_body.spans());
    assert_eq!(plain_lines.len(), anchored_lines.len());
    assert!(!plain_lines.is_empty());
    for (plain_line, anchored_line) in plain_lines.iter().zip(&anchored_lines) {
        assert_eq!(anchored_line - plain_line, 12);
    }

    // The trailing-expression evaluator shifts by the same offset.
    let plain_expr = plain.last_expr.as_ref().expect("evaluator present");
    let anchored_expr = anchored.last_expr.as_ref().expect("evaluator present");
    assert_eq!(
        anchored_expr.spans().span.line.unwrap() - plain_expr.spans().span.line.unwrap(),
        12
    );
}

#[test]
fn unanchored_cells_register_with_the_line_cache() {
    let cache = Arc::new(LineCache::new());
    let compiler = CellCompiler::new().with_line_cache(Arc::clone(&cache));
    let cell_id = CellId::new("Hbol");
    let cell = compiler
        .compile("x = 1\n", &cell_id)
        .expect("cell compiles");

    let filename = cell.body.as_ref().expect("body present").filename();
    assert!(cache.contains(filename));
    assert_eq!(cache.line(filename, 1), Some("x = 1\n".to_owned()));
    assert_eq!(cell_id_from_filename(filename), Some(cell_id));
}

#[test]
fn anchored_cells_skip_the_line_cache() {
    let cache = Arc::new(LineCache::new());
    let compiler = CellCompiler::new().with_line_cache(Arc::clone(&cache));
    let cell = compiler
        .compile_with(
            "x = 1\n",
            &CellId::new("a"),
            CompileOptions {
                source_position: Some(SourcePosition {
                    filename: "/nb/app.py".to_owned(),
                    lineno: 3,
                    col_offset: 0,
                }),
                ..CompileOptions::default()
            },
        )
        .expect("cell compiles");
    assert!(!cache.contains(cell.body.as_ref().expect("body").filename()));
}

#[test]
fn artifacts_compile_independently() {
    for code in ["x = 1", "x + 1", "x = 1\nx + 1", "import os"] {
        let cell = compile(code);
        let body = cell.body.as_ref().expect("body present");
        let last_expr = cell.last_expr.as_ref().expect("evaluator present");
        assert_eq!(body.mode(), CodeMode::Exec);
        assert_eq!(last_expr.mode(), CodeMode::Eval);
        assert_eq!(body.filename(), last_expr.filename());
        assert_eq!(body.flags(), last_expr.flags());
        assert!(body.flags().allow_top_level_await);
    }
}

#[test]
fn non_breaking_spaces_are_normalized() {
    let cell = compile("x\u{00a0}=\u{00a0}1");
    assert_eq!(names(&cell.defs), vec!["x"]);
    assert_eq!(cell.code, "x = 1");
    // The key reflects the normalized text, so the same visible edit hashes
    // identically however the frontend encoded its spaces.
    assert_eq!(cell.key, code_key("x = 1"));
}

#[test]
fn parse_errors_surface_verbatim() {
    let error = CellCompiler::new()
        .compile("def broken(:\n", &CellId::new("0"))
        .expect_err("malformed source");
    assert!(error.span().is_some());
    assert!(!error.message().is_empty());
}

#[test]
fn test_cells_are_flagged() {
    let cell = compile("def test_addition():\n    assert 1 + 1 == 2\n");
    assert!(cell.test);
    assert!(!compile("def helper():\n    pass\n").test);
}

#[test]
fn sql_cells_are_tagged() {
    let cell = compile("df = db.sql(\"SELECT * FROM t\")");
    assert_eq!(cell.language, Language::Sql);
    assert_eq!(compile("x = 1").language, Language::Python);
}

#[test]
fn deleted_foreign_names_are_reported() {
    let cell = compile("del shared");
    assert_eq!(names(&cell.deleted_refs), vec!["shared"]);
}

struct CountingRewriter {
    calls: AtomicUsize,
    fail: bool,
}

impl TestRewriter for CountingRewriter {
    fn rewrite_asserts(
        &self,
        _module: &mut ruff_python_ast::ModModule,
        _code: &str,
        _filename: &str,
    ) -> Result<(), RewriteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(RewriteError::new("incompatible rewriter"))
        } else {
            Ok(())
        }
    }
}

#[test]
fn rewriter_runs_for_test_cells_and_on_request() {
    let rewriter = Arc::new(CountingRewriter {
        calls: AtomicUsize::new(0),
        fail: false,
    });

    struct Shared(Arc<CountingRewriter>);
    impl TestRewriter for Shared {
        fn rewrite_asserts(
            &self,
            module: &mut ruff_python_ast::ModModule,
            code: &str,
            filename: &str,
        ) -> Result<(), RewriteError> {
            self.0.rewrite_asserts(module, code, filename)
        }
    }

    let compiler = CellCompiler::new().with_rewriter(Box::new(Shared(Arc::clone(&rewriter))));
    compiler
        .compile("x = 1", &CellId::new("0"))
        .expect("plain cell compiles");
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 0);

    compiler
        .compile("def test_x():\n    assert True\n", &CellId::new("0"))
        .expect("test cell compiles");
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);

    compiler
        .compile_with(
            "x = 1",
            &CellId::new("0"),
            CompileOptions {
                test_rewrite: true,
                ..CompileOptions::default()
            },
        )
        .expect("requested rewrite compiles");
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn rewriter_failure_is_never_fatal() {
    let compiler = CellCompiler::new().with_rewriter(Box::new(CountingRewriter {
        calls: AtomicUsize::new(0),
        fail: true,
    }));
    let cell = compiler
        .compile("def test_x():\n    assert True\n", &CellId::new("0"))
        .expect("compilation proceeds despite rewriter failure");
    assert!(cell.test);
    assert!(cell.body.is_some());
}
