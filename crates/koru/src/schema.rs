//! Serialized notebook cell definitions.
//!
//! The intermediate-representation factory reconstructs cells from a
//! previously serialized notebook; these records are the subset of that
//! serialization the compiler needs: a name, the cell's code, and which
//! authoring surface the cell came from.

use serde::{Deserialize, Serialize};

use crate::cell::SETUP_CELL_NAME;

/// A cell as stored in a serialized notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellDef {
    /// An ordinary code cell.
    Code(CodeCellDef),
    /// A cell holding a top-level function definition.
    Function(FunctionCellDef),
    /// A cell holding a top-level class definition.
    Class(ClassCellDef),
    /// The implicit setup cell.
    Setup(SetupCellDef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeCellDef {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCellDef {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCellDef {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupCellDef {
    pub code: String,
}

impl CellDef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Code(def) => &def.name,
            Self::Function(def) => &def.name,
            Self::Class(def) => &def.name,
            Self::Setup(_) => SETUP_CELL_NAME,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Code(def) => &def.code,
            Self::Function(def) => &def.code,
            Self::Class(def) => &def.code,
            Self::Setup(def) => &def.code,
        }
    }

    /// True for cells that came from top-level declarations and take the
    /// reserved name prefix.
    #[must_use]
    pub fn is_toplevel(&self) -> bool {
        matches!(self, Self::Function(_) | Self::Class(_))
    }
}
