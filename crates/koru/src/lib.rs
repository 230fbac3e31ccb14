//! Cell-compilation layer for a reactive Python-notebook runtime.
//!
//! Turns a notebook cell's source text into an executable, dataflow-annotated
//! record: the names it defines, the names it references, how its imports
//! relate to earlier compilations, and two executable artifacts — the
//! statement body and the trailing-expression evaluator that computes the
//! cell's displayed value. The reactive scheduler decides what to re-run
//! from the defs/refs sets; the executor runs the artifacts; export paths
//! read the retained source and tree.
//!
//! Entry points: [`CellCompiler::compile`] for raw source, and the factory
//! methods ([`CellCompiler::context_cell`], [`CellCompiler::toplevel_cell`],
//! [`CellCompiler::function_cell`], [`CellCompiler::ir_cell`]) for the
//! authoring surfaces cells are extracted from.

mod cell;
mod code;
mod compile;
mod error;
mod extract;
mod factory;
mod linecache;
mod remap;
mod rewrite;
mod schema;
mod span;
mod variables;
mod visitor;

pub use crate::{
    cell::{Cell, CellId, CompiledCell, ImportWorkspace, SETUP_CELL_NAME, TOPLEVEL_CELL_PREFIX},
    code::{CodeMode, CodeObject, CodeProgram, CompileFlags},
    compile::{CellCompiler, CompileOptions, cell_id_from_filename, code_key, get_filename},
    error::{CellError, ExtractionError, ParseError},
    extract::{
        APP_SPEC_NAME, BlockSource, DeclKind, DeclSource, ExtractedBlock, ExtractedDecl,
        ExtractedFn, ModuleOrigin, SourceMode, extract_block, extract_cell_function,
        extract_declaration,
    },
    linecache::{CacheEntry, LineCache},
    remap::{SourcePosition, SpanKind, SpanNode, shift_spans},
    rewrite::{RewriteError, TestRewriter},
    schema::{CellDef, ClassCellDef, CodeCellDef, FunctionCellDef, SetupCellDef},
    span::{LineIndex, SourceSpan},
    variables::is_local,
    visitor::{BindingKind, ImportData, Language, ScopeAnalysis, VariableData, analyze},
};
