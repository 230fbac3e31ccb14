//! Scope analysis over a cell's syntax tree.
//!
//! Walks a parsed module and reports the names the cell defines at module
//! scope, the names it reads but does not define (its cross-cell
//! references), the names it deletes, and per-name binding metadata. The
//! reactive scheduler builds its dataflow graph from exactly these sets.
//!
//! Resolution follows Python scoping: module-level statements are processed
//! in execution order (a read before its binding is a reference), function
//! and lambda bodies are deferred and resolved against the cell's complete
//! definition set (they run after the cell body has), class bodies execute at
//! definition time in their own scope, comprehensions get a private scope,
//! and walrus targets bind in the nearest enclosing function or module scope.

use indexmap::{IndexMap, IndexSet};
use ruff_python_ast::visitor::{self, Visitor};
use ruff_python_ast::{self as ast, Expr, ModModule, Pattern, Stmt};

use crate::variables::is_builtin;

/// Source dialect detected for a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Sql,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Sql => write!(f, "sql"),
        }
    }
}

/// How a module-scope name was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Function,
    Class,
    Import,
    Variable,
}

/// The import statement behind an import binding.
///
/// Equality is structural over the full descriptor, so two compilations of
/// the same logical cell can recognize "still importing the same thing"
/// without being fooled by an unrelated definition that shares the name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImportData {
    /// The name the import binds in the cell's namespace.
    pub definition: String,
    /// The module being imported from.
    pub module: String,
    /// The symbol pulled out of the module, for `from` imports.
    pub imported_symbol: Option<String>,
    /// Relative-import level (number of leading dots).
    pub import_level: u32,
}

/// Metadata about one binding of a module-scope name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VariableData {
    pub kind: BindingKind,
    pub import_data: Option<ImportData>,
}

/// Everything scope analysis reports about one cell.
#[derive(Debug, Clone, Default)]
pub struct ScopeAnalysis {
    /// Names bound at module scope, in first-binding order. Includes
    /// cell-private underscore names; the compiler partitions those out.
    pub defs: IndexSet<String>,
    /// Names read but not locally resolvable (and not builtins).
    pub refs: IndexSet<String>,
    /// Non-local names the cell deletes during execution.
    pub deleted_refs: IndexSet<String>,
    /// Binding metadata per module-scope name; one entry per rebinding.
    pub variable_data: IndexMap<String, Vec<VariableData>>,
    pub language: Language,
}

/// Analyzes a parsed cell body.
#[must_use]
pub fn analyze(module: &ModModule) -> ScopeAnalysis {
    let mut scoped = ScopedVisitor::default();
    for stmt in &module.body {
        scoped.visit_stmt(stmt);
    }
    scoped.drain_deferred();
    ScopeAnalysis {
        defs: scoped.defs,
        refs: scoped.refs,
        deleted_refs: scoped.deleted_refs,
        variable_data: scoped.variable_data,
        language: detect_language(module),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Function,
    Class,
    Comprehension,
    /// An `except ... as name` binding; shadows the name for load resolution
    /// but captures no other bindings (the name is unbound after the block).
    Handler,
}

#[derive(Debug, Clone)]
struct ScopeFrame {
    kind: FrameKind,
    names: IndexSet<String>,
    /// Names declared `global` in this frame; bindings of them fall through
    /// to module scope.
    globals: IndexSet<String>,
}

impl ScopeFrame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            names: IndexSet::new(),
            globals: IndexSet::new(),
        }
    }
}

enum BodyRef<'a> {
    Statements(&'a [Stmt]),
    Expression(&'a Expr),
}

/// A function or lambda body stashed for post-pass analysis, with the scope
/// stack it closed over (class frames excluded: Python skips class scope
/// when resolving names in methods).
struct DeferredBody<'a> {
    frames: Vec<ScopeFrame>,
    body: BodyRef<'a>,
}

#[derive(Default)]
struct ScopedVisitor<'a> {
    defs: IndexSet<String>,
    refs: IndexSet<String>,
    deleted_refs: IndexSet<String>,
    variable_data: IndexMap<String, Vec<VariableData>>,
    scopes: Vec<ScopeFrame>,
    deferred: Vec<DeferredBody<'a>>,
}

impl<'a> ScopedVisitor<'a> {
    /// Records a load of `name`, resolving against enclosing scopes, the
    /// module definitions seen so far, then the builtins.
    fn load(&mut self, name: &str) {
        for frame in self.scopes.iter().rev() {
            if frame.names.contains(name) {
                return;
            }
        }
        if self.defs.contains(name) || is_builtin(name) {
            return;
        }
        self.refs.insert(name.to_owned());
    }

    /// Records a binding of `name` in the nearest scope that captures
    /// bindings. Comprehension and handler frames are skipped (walrus
    /// targets escape comprehensions); a `global` declaration reroutes the
    /// binding to module scope.
    fn bind(&mut self, name: &str, kind: BindingKind, import_data: Option<ImportData>) {
        for frame in self.scopes.iter_mut().rev() {
            match frame.kind {
                FrameKind::Comprehension | FrameKind::Handler => {}
                FrameKind::Function | FrameKind::Class => {
                    if frame.globals.contains(name) {
                        break;
                    }
                    frame.names.insert(name.to_owned());
                    return;
                }
            }
        }
        self.defs.insert(name.to_owned());
        self.variable_data
            .entry(name.to_owned())
            .or_default()
            .push(VariableData { kind, import_data });
    }

    fn delete_name(&mut self, name: &str) {
        for frame in self.scopes.iter().rev() {
            if frame.names.contains(name) {
                return;
            }
        }
        if self.defs.contains(name) {
            return;
        }
        self.refs.insert(name.to_owned());
        self.deleted_refs.insert(name.to_owned());
    }

    fn snapshot_function_frames(&self) -> Vec<ScopeFrame> {
        self.scopes
            .iter()
            .filter(|frame| frame.kind != FrameKind::Class)
            .cloned()
            .collect()
    }

    fn defer(&mut self, locals: IndexSet<String>, globals: IndexSet<String>, body: BodyRef<'a>) {
        let mut frames = self.snapshot_function_frames();
        frames.push(ScopeFrame {
            kind: FrameKind::Function,
            names: locals,
            globals,
        });
        self.deferred.push(DeferredBody { frames, body });
    }

    /// Analyzes stashed function bodies against the completed definition
    /// set. Bodies deferred while draining (nested functions) queue up for
    /// the next round.
    fn drain_deferred(&mut self) {
        while !self.deferred.is_empty() {
            for deferred in std::mem::take(&mut self.deferred) {
                let saved = std::mem::replace(&mut self.scopes, deferred.frames);
                match deferred.body {
                    BodyRef::Statements(stmts) => {
                        for stmt in stmts {
                            self.visit_stmt(stmt);
                        }
                    }
                    BodyRef::Expression(expr) => self.visit_expr(expr),
                }
                self.scopes = saved;
            }
        }
    }

    fn handle_function(&mut self, func: &'a ast::StmtFunctionDef) {
        for decorator in &func.decorator_list {
            self.visit_expr(&decorator.expression);
        }
        self.visit_parameters_immediate(&func.parameters);
        if let Some(returns) = &func.returns {
            self.visit_expr(returns);
        }
        self.bind(func.name.as_str(), BindingKind::Function, None);

        let mut locals: IndexSet<String> = parameter_names(&func.parameters).into_iter().collect();
        let mut globals = IndexSet::new();
        collect_bound_names(&func.body, &mut locals, &mut globals);
        for name in &globals {
            locals.shift_remove(name);
        }
        self.defer(locals, globals, BodyRef::Statements(&func.body));
    }

    fn handle_class(&mut self, class: &'a ast::StmtClassDef) {
        for decorator in &class.decorator_list {
            self.visit_expr(&decorator.expression);
        }
        if let Some(arguments) = &class.arguments {
            for arg in &arguments.args {
                self.visit_expr(arg);
            }
            for keyword in &arguments.keywords {
                self.visit_expr(&keyword.value);
            }
        }
        self.scopes.push(ScopeFrame::new(FrameKind::Class));
        for stmt in &class.body {
            self.visit_stmt(stmt);
        }
        self.scopes.pop();
        self.bind(class.name.as_str(), BindingKind::Class, None);
    }

    fn handle_lambda(&mut self, lambda: &'a ast::ExprLambda) {
        let mut locals = IndexSet::new();
        if let Some(parameters) = &lambda.parameters {
            self.visit_parameters_immediate(parameters);
            locals.extend(parameter_names(parameters));
        }
        let mut globals = IndexSet::new();
        let mut collector = BindingCollector {
            names: &mut locals,
            globals: &mut globals,
        };
        collector.visit_expr(&lambda.body);
        self.defer(locals, globals, BodyRef::Expression(&lambda.body));
    }

    fn handle_except(&mut self, handler: &'a ast::ExceptHandler) {
        let ast::ExceptHandler::ExceptHandler(handler) = handler;
        if let Some(type_) = &handler.type_ {
            self.visit_expr(type_);
        }
        let mut frame = ScopeFrame::new(FrameKind::Handler);
        if let Some(name) = &handler.name {
            frame.names.insert(name.as_str().to_owned());
        }
        self.scopes.push(frame);
        for stmt in &handler.body {
            self.visit_stmt(stmt);
        }
        self.scopes.pop();
    }

    /// Visits the parts of a parameter list that evaluate at definition
    /// time: defaults and annotations.
    fn visit_parameters_immediate(&mut self, parameters: &'a ast::Parameters) {
        for param in parameters
            .posonlyargs
            .iter()
            .chain(&parameters.args)
            .chain(&parameters.kwonlyargs)
        {
            if let Some(default) = &param.default {
                self.visit_expr(default);
            }
            if let Some(annotation) = &param.parameter.annotation {
                self.visit_expr(annotation);
            }
        }
        if let Some(vararg) = &parameters.vararg
            && let Some(annotation) = &vararg.annotation
        {
            self.visit_expr(annotation);
        }
        if let Some(kwarg) = &parameters.kwarg
            && let Some(annotation) = &kwarg.annotation
        {
            self.visit_expr(annotation);
        }
    }

    /// Evaluates comprehension generators: the first iterable in the
    /// enclosing scope, everything else inside a fresh comprehension frame.
    /// The frame is left on the stack for the caller to pop.
    fn enter_generators(&mut self, generators: &'a [ast::Comprehension]) {
        if let Some(first) = generators.first() {
            self.visit_expr(&first.iter);
        }
        let mut frame = ScopeFrame::new(FrameKind::Comprehension);
        for comp in generators {
            store_names(&comp.target, &mut frame.names);
        }
        self.scopes.push(frame);
        for (i, comp) in generators.iter().enumerate() {
            if i > 0 {
                self.visit_expr(&comp.iter);
            }
            for if_clause in &comp.ifs {
                self.visit_expr(if_clause);
            }
        }
    }
}

impl<'a> Visitor<'a> for ScopedVisitor<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::FunctionDef(func) => self.handle_function(func),
            Stmt::ClassDef(class) => self.handle_class(class),
            Stmt::Assign(assign) => {
                // Value before targets: the right-hand side runs first.
                self.visit_expr(&assign.value);
                for target in &assign.targets {
                    self.visit_expr(target);
                }
            }
            Stmt::AugAssign(aug) => {
                self.visit_expr(&aug.value);
                if let Expr::Name(name) = &*aug.target {
                    // `x += 1` reads x before rebinding it.
                    self.load(name.id.as_str());
                }
                self.visit_expr(&aug.target);
            }
            Stmt::AnnAssign(ann) => {
                self.visit_expr(&ann.annotation);
                if let Some(value) = &ann.value {
                    self.visit_expr(value);
                    self.visit_expr(&ann.target);
                } else if !matches!(&*ann.target, Expr::Name(_)) {
                    // `obj.attr: T` still evaluates obj; a bare annotated
                    // name binds nothing at runtime.
                    self.visit_expr(&ann.target);
                }
            }
            Stmt::For(for_stmt) => {
                self.visit_expr(&for_stmt.iter);
                self.visit_expr(&for_stmt.target);
                for stmt in &for_stmt.body {
                    self.visit_stmt(stmt);
                }
                for stmt in &for_stmt.orelse {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Try(try_stmt) => {
                for stmt in &try_stmt.body {
                    self.visit_stmt(stmt);
                }
                for handler in &try_stmt.handlers {
                    self.handle_except(handler);
                }
                for stmt in &try_stmt.orelse {
                    self.visit_stmt(stmt);
                }
                for stmt in &try_stmt.finalbody {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Delete(delete) => {
                for target in &delete.targets {
                    match target {
                        Expr::Name(name) => self.delete_name(name.id.as_str()),
                        other => self.visit_expr(other),
                    }
                }
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    let binding = import_binding_name(alias);
                    let data = ImportData {
                        definition: binding.clone(),
                        module: alias.name.as_str().to_owned(),
                        imported_symbol: None,
                        import_level: 0,
                    };
                    self.bind(&binding, BindingKind::Import, Some(data));
                }
            }
            Stmt::ImportFrom(import) => {
                let module = import
                    .module
                    .as_ref()
                    .map(|module| module.as_str().to_owned())
                    .unwrap_or_default();
                for alias in &import.names {
                    let binding = from_import_binding_name(alias);
                    let data = ImportData {
                        definition: binding.clone(),
                        module: module.clone(),
                        imported_symbol: Some(alias.name.as_str().to_owned()),
                        import_level: import.level,
                    };
                    self.bind(&binding, BindingKind::Import, Some(data));
                }
            }
            Stmt::Global(global) => {
                if let Some(frame) = self.scopes.last_mut() {
                    for name in &global.names {
                        frame.globals.insert(name.as_str().to_owned());
                    }
                }
            }
            Stmt::Nonlocal(_) => {}
            Stmt::TypeAlias(alias) => {
                self.visit_expr(&alias.value);
                self.visit_expr(&alias.name);
            }
            _ => visitor::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Name(name) => match name.ctx {
                ast::ExprContext::Load => self.load(name.id.as_str()),
                ast::ExprContext::Store => self.bind(name.id.as_str(), BindingKind::Variable, None),
                _ => {}
            },
            Expr::Lambda(lambda) => self.handle_lambda(lambda),
            Expr::ListComp(comp) => {
                self.enter_generators(&comp.generators);
                self.visit_expr(&comp.elt);
                self.scopes.pop();
            }
            Expr::SetComp(comp) => {
                self.enter_generators(&comp.generators);
                self.visit_expr(&comp.elt);
                self.scopes.pop();
            }
            Expr::Generator(comp) => {
                self.enter_generators(&comp.generators);
                self.visit_expr(&comp.elt);
                self.scopes.pop();
            }
            Expr::DictComp(comp) => {
                self.enter_generators(&comp.generators);
                if let Some(key) = &comp.key {
                    self.visit_expr(key);
                }
                self.visit_expr(&comp.value);
                self.scopes.pop();
            }
            Expr::Named(named) => {
                self.visit_expr(&named.value);
                self.visit_expr(&named.target);
            }
            _ => visitor::walk_expr(self, expr),
        }
    }

    fn visit_pattern(&mut self, pattern: &'a Pattern) {
        match pattern {
            Pattern::MatchAs(as_pat) => {
                if let Some(inner) = &as_pat.pattern {
                    self.visit_pattern(inner);
                }
                if let Some(name) = &as_pat.name
                    && name.as_str() != "_"
                {
                    self.bind(name.as_str(), BindingKind::Variable, None);
                }
            }
            Pattern::MatchStar(star) => {
                if let Some(name) = &star.name {
                    self.bind(name.as_str(), BindingKind::Variable, None);
                }
            }
            _ => visitor::walk_pattern(self, pattern),
        }
    }
}

/// Collects the names a function body binds anywhere, without entering
/// nested function/class/lambda scopes. Python makes a name local for the
/// whole function if it is assigned anywhere in it.
fn collect_bound_names(body: &[Stmt], names: &mut IndexSet<String>, globals: &mut IndexSet<String>) {
    let mut collector = BindingCollector { names, globals };
    for stmt in body {
        collector.visit_stmt(stmt);
    }
}

struct BindingCollector<'o> {
    names: &'o mut IndexSet<String>,
    globals: &'o mut IndexSet<String>,
}

impl<'a> Visitor<'a> for BindingCollector<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::FunctionDef(func) => {
                self.names.insert(func.name.as_str().to_owned());
            }
            Stmt::ClassDef(class) => {
                self.names.insert(class.name.as_str().to_owned());
            }
            Stmt::Global(global) => {
                for name in &global.names {
                    self.globals.insert(name.as_str().to_owned());
                }
            }
            Stmt::Nonlocal(nonlocal) => {
                // Nonlocal bindings write an enclosing function's slot; for
                // dataflow purposes the name stays local to the closure.
                for name in &nonlocal.names {
                    self.names.insert(name.as_str().to_owned());
                }
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    self.names.insert(import_binding_name(alias));
                }
            }
            Stmt::ImportFrom(import) => {
                for alias in &import.names {
                    self.names.insert(from_import_binding_name(alias));
                }
            }
            _ => visitor::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Name(name) => {
                if matches!(name.ctx, ast::ExprContext::Store) {
                    self.names.insert(name.id.as_str().to_owned());
                }
            }
            Expr::Lambda(lambda) => {
                // Defaults evaluate in this scope; the body is a nested one.
                if let Some(parameters) = &lambda.parameters {
                    for param in parameters
                        .posonlyargs
                        .iter()
                        .chain(&parameters.args)
                        .chain(&parameters.kwonlyargs)
                    {
                        if let Some(default) = &param.default {
                            self.visit_expr(default);
                        }
                    }
                }
            }
            _ => visitor::walk_expr(self, expr),
        }
    }

    fn visit_pattern(&mut self, pattern: &'a Pattern) {
        match pattern {
            Pattern::MatchAs(as_pat) => {
                if let Some(inner) = &as_pat.pattern {
                    self.visit_pattern(inner);
                }
                if let Some(name) = &as_pat.name {
                    self.names.insert(name.as_str().to_owned());
                }
            }
            Pattern::MatchStar(star) => {
                if let Some(name) = &star.name {
                    self.names.insert(name.as_str().to_owned());
                }
            }
            _ => visitor::walk_pattern(self, pattern),
        }
    }
}

/// All parameter names of a signature, in declaration order.
pub(crate) fn parameter_names(parameters: &ast::Parameters) -> Vec<String> {
    let mut names = Vec::new();
    for param in &parameters.posonlyargs {
        names.push(param.parameter.name.as_str().to_owned());
    }
    for param in &parameters.args {
        names.push(param.parameter.name.as_str().to_owned());
    }
    if let Some(vararg) = &parameters.vararg {
        names.push(vararg.name.as_str().to_owned());
    }
    for param in &parameters.kwonlyargs {
        names.push(param.parameter.name.as_str().to_owned());
    }
    if let Some(kwarg) = &parameters.kwarg {
        names.push(kwarg.name.as_str().to_owned());
    }
    names
}

/// Store-context names reachable through assignment-target structure.
fn store_names(target: &Expr, out: &mut IndexSet<String>) {
    match target {
        Expr::Name(name) => {
            out.insert(name.id.as_str().to_owned());
        }
        Expr::Tuple(tuple) => {
            for elt in &tuple.elts {
                store_names(elt, out);
            }
        }
        Expr::List(list) => {
            for elt in &list.elts {
                store_names(elt, out);
            }
        }
        Expr::Starred(starred) => store_names(&starred.value, out),
        _ => {}
    }
}

/// The name `import a.b.c [as x]` binds: the alias if present, otherwise the
/// top-level package.
fn import_binding_name(alias: &ast::Alias) -> String {
    match &alias.asname {
        Some(asname) => asname.as_str().to_owned(),
        None => alias
            .name
            .as_str()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_owned(),
    }
}

/// The name `from m import a [as x]` binds.
fn from_import_binding_name(alias: &ast::Alias) -> String {
    match &alias.asname {
        Some(asname) => asname.as_str().to_owned(),
        None => alias.name.as_str().to_owned(),
    }
}

/// A cell whose sole statement is a `*.sql("...")` call (bare or assigned)
/// holds a SQL query; everything else is Python.
fn detect_language(module: &ModModule) -> Language {
    if module.body.len() != 1 {
        return Language::Python;
    }
    let value = match &module.body[0] {
        Stmt::Expr(stmt) => &stmt.value,
        Stmt::Assign(stmt) => &stmt.value,
        _ => return Language::Python,
    };
    let Expr::Call(call) = &**value else {
        return Language::Python;
    };
    let Expr::Attribute(attribute) = &*call.func else {
        return Language::Python;
    };
    if attribute.attr.as_str() != "sql" {
        return Language::Python;
    }
    match call.arguments.args.first() {
        Some(Expr::StringLiteral(_) | Expr::FString(_)) => Language::Sql,
        _ => Language::Python,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use ruff_python_parser::parse_module;

    use super::*;

    fn run(code: &str) -> ScopeAnalysis {
        let module = parse_module(code).expect("test source should parse").into_syntax();
        analyze(&module)
    }

    fn set(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn assignments_define_in_order() {
        let analysis = run("x = 1\ny = x + 1\n");
        assert_eq!(analysis.defs, set(&["x", "y"]));
        assert_eq!(analysis.refs, set(&[]));
    }

    #[test]
    fn read_before_binding_is_a_ref() {
        let analysis = run("y = x\nx = 1\n");
        assert_eq!(analysis.defs, set(&["y", "x"]));
        assert_eq!(analysis.refs, set(&["x"]));
    }

    #[test]
    fn builtins_are_not_refs() {
        let analysis = run("print(data)\n");
        assert_eq!(analysis.refs, set(&["data"]));
    }

    #[test]
    fn function_free_names_are_refs() {
        let analysis = run("def f():\n    return data\n");
        assert_eq!(analysis.defs, set(&["f"]));
        assert_eq!(analysis.refs, set(&["data"]));
        assert_eq!(
            analysis.variable_data["f"],
            vec![VariableData {
                kind: BindingKind::Function,
                import_data: None,
            }]
        );
    }

    #[test]
    fn function_bodies_resolve_against_later_defs() {
        // f runs after the cell body, by which time y exists.
        let analysis = run("def f():\n    return y\ny = 1\n");
        assert_eq!(analysis.refs, set(&[]));
    }

    #[test]
    fn parameters_and_locals_are_not_refs() {
        let analysis = run("def f(a, *rest, **extra):\n    b = a + 1\n    return b\n");
        assert_eq!(analysis.refs, set(&[]));
    }

    #[test]
    fn import_binds_top_level_package() {
        let analysis = run("import os.path\n");
        assert_eq!(analysis.defs, set(&["os"]));
        let data = &analysis.variable_data["os"][0];
        assert_eq!(data.kind, BindingKind::Import);
        assert_eq!(
            data.import_data,
            Some(ImportData {
                definition: "os".to_owned(),
                module: "os.path".to_owned(),
                imported_symbol: None,
                import_level: 0,
            })
        );
    }

    #[test]
    fn import_alias_binds_the_alias() {
        let analysis = run("import numpy as np\nfrom a.b import c as d\n");
        assert_eq!(analysis.defs, set(&["np", "d"]));
        let data = &analysis.variable_data["d"][0];
        assert_eq!(
            data.import_data,
            Some(ImportData {
                definition: "d".to_owned(),
                module: "a.b".to_owned(),
                imported_symbol: Some("c".to_owned()),
                import_level: 0,
            })
        );
    }

    #[test]
    fn delete_of_foreign_name_is_recorded() {
        let analysis = run("del x\n");
        assert_eq!(analysis.deleted_refs, set(&["x"]));
        assert_eq!(analysis.refs, set(&["x"]));
    }

    #[test]
    fn delete_of_own_def_is_not_a_deleted_ref() {
        let analysis = run("x = 1\ndel x\n");
        assert_eq!(analysis.deleted_refs, set(&[]));
    }

    #[test]
    fn class_scope_is_invisible_to_methods() {
        let analysis = run("class A:\n    x = 1\n    def m(self):\n        return x\n");
        assert_eq!(analysis.defs, set(&["A"]));
        assert_eq!(analysis.refs, set(&["x"]));
    }

    #[test]
    fn class_body_reads_resolve_at_definition_time() {
        let analysis = run("class A:\n    x = 1\n    y = x + 1\n");
        assert_eq!(analysis.defs, set(&["A"]));
        assert_eq!(analysis.refs, set(&[]));
    }

    #[test]
    fn walrus_binds_at_module_scope() {
        let analysis = run("(y := 2)\n");
        assert_eq!(analysis.defs, set(&["y"]));
    }

    #[test]
    fn comprehension_targets_stay_private() {
        let analysis = run("out = [i * i for i in items]\n");
        assert_eq!(analysis.defs, set(&["out"]));
        assert_eq!(analysis.refs, set(&["items"]));
    }

    #[test]
    fn walrus_escapes_comprehension_scope() {
        let analysis = run("out = [last := i for i in items]\n");
        assert_eq!(analysis.defs, set(&["out", "last"]));
    }

    #[test]
    fn lambda_free_names_are_refs() {
        let analysis = run("f = lambda a: a + b\n");
        assert_eq!(analysis.defs, set(&["f"]));
        assert_eq!(analysis.refs, set(&["b"]));
    }

    #[test]
    fn global_assignment_inside_function_defines() {
        let analysis = run("def f():\n    global counter\n    counter = 1\n");
        assert_eq!(analysis.defs, set(&["f", "counter"]));
    }

    #[test]
    fn augmented_assignment_reads_then_defines() {
        let analysis = run("x += 1\n");
        assert_eq!(analysis.defs, set(&["x"]));
        assert_eq!(analysis.refs, set(&["x"]));
    }

    #[test]
    fn except_binding_does_not_define() {
        let analysis = run("try:\n    pass\nexcept ValueError as e:\n    print(e)\n");
        assert_eq!(analysis.defs, set(&[]));
        assert_eq!(analysis.refs, set(&[]));
    }

    #[test]
    fn sql_cells_are_detected() {
        assert_eq!(run("df = db.sql(\"SELECT 1\")\n").language, Language::Sql);
        assert_eq!(run("db.sql(\"SELECT 1\")\n").language, Language::Sql);
        assert_eq!(run("db.sql(query)\n").language, Language::Python);
        assert_eq!(run("x = 1\n").language, Language::Python);
    }
}
