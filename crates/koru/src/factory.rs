//! Cell factories: thin compositions of extraction and compilation that
//! assign each cell its public name.

use crate::cell::{
    Cell, CellId, SETUP_CELL_NAME, TEST_CLASS_PREFIX, TEST_FUNCTION_PREFIX, TOPLEVEL_CELL_PREFIX,
};
use crate::compile::{CellCompiler, CompileOptions};
use crate::error::CellError;
use crate::extract::{
    self, BlockSource, DeclKind, DeclSource, ModuleOrigin, SourceMode,
};
use crate::remap::SourcePosition;
use crate::schema::CellDef;

/// Anchor policy shared by the extraction-based factories: cells anchor to
/// their real file only when running as a script and not explicitly
/// anonymized. Anonymous compilation keeps tests deterministic; app mode
/// avoids leaking runtime-internal paths.
fn source_position(
    origin: &ModuleOrigin,
    lineno: u32,
    col_offset: u32,
    anonymous_file: bool,
) -> Option<SourcePosition> {
    if anonymous_file || origin.mode != SourceMode::Script {
        return None;
    }
    Some(SourcePosition {
        filename: origin.filename.clone(),
        lineno,
        col_offset,
    })
}

impl CellCompiler {
    /// Builds the implicit setup cell from a registered lexical block.
    pub fn context_cell(
        &self,
        cell_id: CellId,
        block: &BlockSource,
        anonymous_file: bool,
    ) -> Result<Cell, CellError> {
        let extracted = extract::extract_block(block)?;
        let position = source_position(
            &block.origin,
            extracted.lineno,
            extracted.col_offset,
            anonymous_file,
        );
        let cell = self.compile_with(
            &extracted.code,
            &cell_id,
            CompileOptions {
                source_position: position,
                ..CompileOptions::default()
            },
        )?;
        Ok(Cell {
            name: SETUP_CELL_NAME.to_owned(),
            cell,
            test_allowed: false,
            expected_signature: None,
        })
    }

    /// Builds a cell from a decorated top-level declaration. Unlike
    /// [`Self::function_cell`], the declaration itself is the cell body, so
    /// its signature and return type carry meaning.
    pub fn toplevel_cell(
        &self,
        cell_id: CellId,
        decl: &DeclSource,
        anonymous_file: bool,
        test_rewrite: bool,
    ) -> Result<Cell, CellError> {
        let extracted = extract::extract_declaration(decl)?;
        let position = source_position(&decl.origin, extracted.lineno, 0, anonymous_file);
        let cell = self.compile_with(
            &extracted.code,
            &cell_id,
            CompileOptions {
                source_position: position,
                test_rewrite,
                ..CompileOptions::default()
            },
        )?;
        let is_test = match extracted.kind {
            DeclKind::Class => extracted.name.starts_with(TEST_CLASS_PREFIX),
            DeclKind::Function => extracted.name.starts_with(TEST_FUNCTION_PREFIX),
        };
        Ok(Cell {
            // The reserved prefix keeps these names out of the user
            // namespace, so thrashed declarations fall back cleanly.
            name: format!("{TOPLEVEL_CELL_PREFIX}{}", extracted.name),
            test_allowed: cell.test || is_test,
            cell,
            expected_signature: None,
        })
    }

    /// Builds a cell from a cell-marked function. The function's signature
    /// and returns never feed dataflow analysis; parameter names are only
    /// recorded for later signature-drift detection.
    pub fn function_cell(
        &self,
        cell_id: CellId,
        func: &DeclSource,
        anonymous_file: bool,
        test_rewrite: bool,
    ) -> Result<Cell, CellError> {
        let extracted = extract::extract_cell_function(func)?;
        let position = source_position(
            &func.origin,
            extracted.lineno,
            extracted.col_offset,
            anonymous_file,
        );
        let cell = self.compile_with(
            &extracted.code,
            &cell_id,
            CompileOptions {
                source_position: position,
                test_rewrite,
                ..CompileOptions::default()
            },
        )?;
        let is_test = extracted.name.starts_with(TEST_FUNCTION_PREFIX);
        Ok(Cell {
            name: extracted.name,
            test_allowed: cell.test || is_test,
            cell,
            expected_signature: Some(extracted.params),
        })
    }

    /// Reconstructs a cell from a serialized notebook definition. Source is
    /// already isolated, so there is nothing to extract, and this path never
    /// anchors or rewrites: it is not an authoring-time surface.
    pub fn ir_cell(&self, cell_id: CellId, def: &CellDef) -> Result<Cell, CellError> {
        let cell = self.compile(def.code(), &cell_id)?;
        let prefix = if def.is_toplevel() {
            TOPLEVEL_CELL_PREFIX
        } else {
            ""
        };
        Ok(Cell {
            name: format!("{prefix}{}", def.name()),
            test_allowed: cell.test,
            cell,
            expected_signature: None,
        })
    }
}
