//! Process-wide debug line cache for synthetic cell filenames.
//!
//! Cells compiled without a source anchor have no backing file; their code is
//! registered here under a synthetic filename so tracebacks and debuggers can
//! still display and step through it. Entries are added on compile and never
//! evicted for the process lifetime.

use std::sync::{Mutex, OnceLock};

use ahash::AHashMap;

/// One cached source: its total length, its lines (each with the trailing
/// newline restored), and the filename it is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub size: usize,
    pub lines: Vec<String>,
    pub filename: String,
}

/// Insert-only map from synthetic filename to cached source.
///
/// The process-wide instance behind [`LineCache::global`] serves ordinary
/// compilation; tests substitute an isolated instance through
/// [`crate::CellCompiler::with_line_cache`]. Distinct cells never collide
/// (filenames encode the cell id), so the mutex only serializes the
/// individual map operations.
#[derive(Debug, Default)]
pub struct LineCache {
    entries: Mutex<AHashMap<String, CacheEntry>>,
}

impl LineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<LineCache> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Registers `code` under `filename`.
    pub fn insert(&self, filename: &str, code: &str) {
        let entry = CacheEntry {
            size: code.len(),
            lines: code.lines().map(|line| format!("{line}\n")).collect(),
            filename: filename.to_owned(),
        };
        self.entries
            .lock()
            .expect("line cache lock is never poisoned")
            .insert(filename.to_owned(), entry);
    }

    /// The full entry registered under `filename`, if any.
    #[must_use]
    pub fn entry(&self, filename: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .expect("line cache lock is never poisoned")
            .get(filename)
            .cloned()
    }

    /// A single 1-indexed source line of a cached file.
    #[must_use]
    pub fn line(&self, filename: &str, lineno: u32) -> Option<String> {
        let guard = self
            .entries
            .lock()
            .expect("line cache lock is never poisoned");
        let entry = guard.get(filename)?;
        entry.lines.get(lineno.checked_sub(1)? as usize).cloned()
    }

    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.entries
            .lock()
            .expect("line cache lock is never poisoned")
            .contains_key(filename)
    }
}
