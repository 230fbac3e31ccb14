//! Error taxonomy for cell compilation.
//!
//! Parse and extraction failures stay distinct so the caller can decide
//! whether to mark a single cell as broken or abort the whole notebook load.
//! Errors surface with their original classification; nothing here wraps a
//! lower error into a string.

use std::borrow::Cow;
use std::fmt;

use crate::span::SourceSpan;

/// Malformed source text. Fatal; no recovery is attempted by the compiler.
#[derive(Debug, Clone)]
pub struct ParseError {
    msg: Cow<'static, str>,
    span: Option<SourceSpan>,
}

impl ParseError {
    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, span: Option<SourceSpan>) -> Self {
        Self {
            msg: msg.into(),
            span,
        }
    }

    /// The parser's diagnostic message, verbatim.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Where the failure was reported, in cell-local coordinates.
    #[must_use]
    pub fn span(&self) -> Option<SourceSpan> {
        self.span
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span.and_then(|s| s.line) {
            Some(line) => write!(f, "{} (line {line})", self.msg),
            None => write!(f, "{}", self.msg),
        }
    }
}

impl std::error::Error for ParseError {}

/// A cell extractor could not recover the cell's source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// A declaration-based factory found no decorator to scrub; the calling
    /// convention requires exactly one recognized marker decorator.
    MissingDecorator,
    /// No `with` block spans the given entry line.
    BlockNotFound { entry_line: u32 },
    /// The recovered source parsed to an empty module.
    EmptyBody,
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDecorator => {
                write!(f, "unexpected usage (expected a decorated declaration)")
            }
            Self::BlockNotFound { entry_line } => {
                write!(f, "no block found at entry line {entry_line}")
            }
            Self::EmptyBody => write!(f, "recovered source contains no statements"),
        }
    }
}

impl std::error::Error for ExtractionError {}

/// Error type for the cell factories, separating failures by pipeline stage.
#[derive(Debug, Clone)]
pub enum CellError {
    /// The cell's source text failed to parse.
    Parse(ParseError),
    /// The cell's source text could not be located/extracted.
    Extraction(ExtractionError),
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(error) => write!(f, "parse error: {error}"),
            Self::Extraction(error) => write!(f, "extraction error: {error}"),
        }
    }
}

impl std::error::Error for CellError {}

impl From<ParseError> for CellError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}

impl From<ExtractionError> for CellError {
    fn from(error: ExtractionError) -> Self {
        Self::Extraction(error)
    }
}
