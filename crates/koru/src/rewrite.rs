//! Injected test-assertion rewriting.
//!
//! Assertion rewriting (richer failure messages for `assert` statements in
//! test cells) is an optional capability supplied by the embedding runtime.
//! Absence of a rewriter is a configuration state, not a failure: the
//! compiler logs a warning and compiles the unmodified tree.

use std::fmt;

use ruff_python_ast::ModModule;

/// A rewriter rejected or failed on a tree. Never fatal to compilation.
#[derive(Debug, Clone)]
pub struct RewriteError {
    msg: String,
}

impl RewriteError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for RewriteError {}

/// Rewrites assertions in a cell's tree for richer test-failure messages.
///
/// Implementations mutate the module in place and must preserve statement
/// ranges: the artifact's span tree is built from the pre-rewrite positions
/// so failures keep pointing at the user's source.
pub trait TestRewriter: Send + Sync {
    fn rewrite_asserts(
        &self,
        module: &mut ModModule,
        code: &str,
        filename: &str,
    ) -> Result<(), RewriteError>;
}
