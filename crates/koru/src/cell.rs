//! Cell data model: identifiers, compiled records, and named handles.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use ruff_python_ast::ModModule;

use crate::code::CodeObject;
use crate::visitor::{Language, VariableData};

/// Name given to the implicit setup cell produced by the context-block
/// factory.
pub const SETUP_CELL_NAME: &str = "setup";

/// Prefix for cells synthesized from top-level declarations. Deliberately an
/// invalid identifier character so these names can never collide with a
/// user-defined cell.
pub const TOPLEVEL_CELL_PREFIX: &str = "*";

/// Case-insensitive name prefix marking test functions and classes.
pub(crate) const TEST_NAME_PREFIX: &str = "test";
/// Name prefix marking a test function.
pub(crate) const TEST_FUNCTION_PREFIX: &str = "test_";
/// Name prefix marking a test class.
pub(crate) const TEST_CLASS_PREFIX: &str = "Test";

/// Opaque cell identifier, unique within a notebook.
///
/// Identity persists across recompilations; only the wrapped [`CompiledCell`]
/// is replaced when a cell's code changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Import provenance for a cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportWorkspace {
    /// True when every top-level statement of the cell is an import.
    pub is_import_block: bool,
    /// Definitions recognized as continuations of imports from a prior
    /// compilation of the same logical cell, matched by import descriptor
    /// rather than by name.
    pub imported_defs: IndexSet<String>,
}

/// The immutable result of compiling one cell.
///
/// Produced once per compilation request and replaced wholesale on
/// recompilation. `defs`, `refs`, and `temporaries` are pairwise disjoint;
/// every key of `variable_data` is in `defs`.
#[derive(Debug, Clone)]
pub struct CompiledCell {
    /// Hash of the original source, for cache keying and dedup.
    pub key: u64,
    /// The cell's source text as received (after whitespace normalization).
    pub code: String,
    /// The un-split syntax tree, in cell-local coordinates; kept for
    /// downstream static analysis and export.
    pub tree: ModModule,
    /// Names the cell defines that are visible to other cells.
    pub defs: IndexSet<String>,
    /// Names the cell reads but does not itself define.
    pub refs: IndexSet<String>,
    /// Names defined and consumed only within the cell's own scope.
    pub temporaries: IndexSet<String>,
    /// Binding metadata for each externally-visible defined name.
    pub variable_data: IndexMap<String, Vec<VariableData>>,
    /// Non-local names the cell deletes during execution.
    pub deleted_refs: IndexSet<String>,
    pub language: Language,
    pub import_workspace: ImportWorkspace,
    /// The statement body; `None` for inert (empty) cells.
    pub body: Option<CodeObject>,
    /// The trailing-expression evaluator; `None` for inert cells.
    pub last_expr: Option<CodeObject>,
    pub cell_id: CellId,
    /// True when the cell contains only test definitions.
    pub test: bool,
}

impl CompiledCell {
    /// True for whitespace/comment-only cells, which compile to no
    /// executable artifacts.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.body.is_none()
    }
}

/// A named, addressable handle over a compiled cell.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Human-facing name; possibly synthesized ([`SETUP_CELL_NAME`],
    /// [`TOPLEVEL_CELL_PREFIX`]).
    pub name: String,
    pub cell: CompiledCell,
    /// Whether tests are permitted to run in this cell.
    pub test_allowed: bool,
    /// Parameter names captured at definition time for function-derived
    /// cells, used later for signature-drift detection.
    pub expected_signature: Option<Vec<String>>,
}

impl Cell {
    #[must_use]
    pub fn id(&self) -> &CellId {
        &self.cell.cell_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_ids_display_as_their_token() {
        let id = CellId::new("Hbol");
        assert_eq!(id.to_string(), "Hbol");
        assert_eq!(id.as_str(), "Hbol");
    }

    #[test]
    fn toplevel_prefix_is_not_an_identifier() {
        assert!(
            !TOPLEVEL_CELL_PREFIX
                .chars()
                .any(|c| c.is_alphanumeric() || c == '_')
        );
    }
}
