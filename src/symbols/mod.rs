//! Symbol bookkeeping for template compilation.
//!
//! Two layers of state exist:
//!
//! - [`SymbolTable`] belongs to one compilation job. It records every partial,
//!   helper and ambiguous name the naming hook has seen, and what resolution
//!   made of it. Entries move from pending to attempted exactly once, which is
//!   what bounds the number of compile passes.
//! - [`BuildCache`] is shared (via `Arc`) by every job of one build run. It
//!   carries the [`KnownHelperSet`] and the paths of helpers already found, so
//!   later templates skip lookups earlier templates have done. Every write is
//!   an idempotent "upgrade to found", so concurrent jobs may race freely.
//!
//! # Example
//!
//! ```rust
//! use hbs_loader::symbols::{SymbolKind, SymbolTable};
//! use std::path::PathBuf;
//!
//! let mut table = SymbolTable::new();
//! table.register(SymbolKind::Partial, "header");
//! assert_eq!(table.pending(SymbolKind::Partial), vec!["header".to_string()]);
//!
//! table.mark_resolved(SymbolKind::Partial, "header", PathBuf::from("/src/header.hbs"));
//! assert!(table.pending(SymbolKind::Partial).is_empty());
//! ```

use dashmap::{DashMap, DashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// The table a symbol is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Partial,
    Helper,
    /// A context lookup whose name is also a known helper name
    Ambiguous,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial => write!(f, "partial"),
            Self::Helper => write!(f, "helper"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// A referenced name together with the table it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Outcome of resolving one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Seen by the naming hook, not searched yet
    Pending,
    /// Found; the symbol is a module dependency
    Resolved(PathBuf),
    /// Searched and not found; never searched again
    Unresolved,
}

/// Snapshot of one symbol's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub symbol: Symbol,
    pub resolution: Resolution,
}

impl ResolutionEntry {
    #[must_use]
    pub fn resolved_path(&self) -> Option<&Path> {
        match &self.resolution {
            Resolution::Resolved(path) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn attempted(&self) -> bool {
        !matches!(self.resolution, Resolution::Pending)
    }
}

/// Per-job symbol state, partitioned by kind.
///
/// Iteration order is by name so batches and dependency lists are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    partials: BTreeMap<String, Resolution>,
    helpers: BTreeMap<String, Resolution>,
    ambiguous: BTreeMap<String, Resolution>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: SymbolKind) -> &BTreeMap<String, Resolution> {
        match kind {
            SymbolKind::Partial => &self.partials,
            SymbolKind::Helper => &self.helpers,
            SymbolKind::Ambiguous => &self.ambiguous,
        }
    }

    fn table_mut(&mut self, kind: SymbolKind) -> &mut BTreeMap<String, Resolution> {
        match kind {
            SymbolKind::Partial => &mut self.partials,
            SymbolKind::Helper => &mut self.helpers,
            SymbolKind::Ambiguous => &mut self.ambiguous,
        }
    }

    /// Record `name` as pending unless it is already known. Returns `true`
    /// when the symbol is new.
    pub fn register(&mut self, kind: SymbolKind, name: &str) -> bool {
        let table = self.table_mut(kind);
        if table.contains_key(name) {
            return false;
        }
        table.insert(name.to_string(), Resolution::Pending);
        true
    }

    #[must_use]
    pub fn get(&self, kind: SymbolKind, name: &str) -> Option<&Resolution> {
        self.table(kind).get(name)
    }

    #[must_use]
    pub fn resolved_path(&self, kind: SymbolKind, name: &str) -> Option<&Path> {
        match self.get(kind, name) {
            Some(Resolution::Resolved(path)) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_attempted(&self, kind: SymbolKind, name: &str) -> bool {
        matches!(self.get(kind, name), Some(Resolution::Resolved(_) | Resolution::Unresolved))
    }

    /// Names of `kind` that have been seen but not searched.
    #[must_use]
    pub fn pending(&self, kind: SymbolKind) -> Vec<String> {
        self.table(kind)
            .iter()
            .filter(|(_, state)| matches!(state, Resolution::Pending))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Record a successful resolution. An unresolved entry may be upgraded;
    /// an existing path is kept.
    pub fn mark_resolved(&mut self, kind: SymbolKind, name: &str, path: PathBuf) {
        let entry = self.table_mut(kind).entry(name.to_string()).or_insert(Resolution::Pending);
        if !matches!(entry, Resolution::Resolved(_)) {
            *entry = Resolution::Resolved(path);
        }
    }

    /// Record a failed resolution. Only pending entries change.
    pub fn mark_unresolved(&mut self, kind: SymbolKind, name: &str) {
        if let Some(entry @ Resolution::Pending) = self.table_mut(kind).get_mut(name) {
            *entry = Resolution::Unresolved;
        }
    }

    /// Reclassify a resolved ambiguous symbol as a helper.
    ///
    /// The ambiguous entry is closed and the helper table gains the path; the
    /// partial table is never touched.
    pub fn promote(&mut self, name: &str, path: PathBuf) {
        self.mark_resolved(SymbolKind::Ambiguous, name, path.clone());
        self.mark_resolved(SymbolKind::Helper, name, path);
    }

    /// Every entry of `kind`.
    #[must_use]
    pub fn entries(&self, kind: SymbolKind) -> Vec<ResolutionEntry> {
        self.table(kind)
            .iter()
            .map(|(name, resolution)| ResolutionEntry {
                symbol: Symbol::new(kind, name.clone()),
                resolution: resolution.clone(),
            })
            .collect()
    }

    /// Distinct paths of resolved partials and helpers, sorted.
    #[must_use]
    pub fn dependencies(&self) -> Vec<PathBuf> {
        let paths: BTreeSet<PathBuf> = self
            .partials
            .values()
            .chain(self.helpers.values())
            .filter_map(|state| match state {
                Resolution::Resolved(path) => Some(path.clone()),
                _ => None,
            })
            .collect();
        paths.into_iter().collect()
    }

    /// Total number of symbols across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partials.len() + self.helpers.len() + self.ambiguous.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Names the compiler treats as call-syntax helpers. Grow-only.
#[derive(Debug, Default)]
pub struct KnownHelperSet {
    names: DashSet<String>,
}

impl KnownHelperSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `name` was not known before.
    pub fn insert(&self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_string())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sorted copy for handing to the compiler.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.names.iter().map(|name| name.key().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// State shared by every job of one build run.
///
/// Found helpers are keyed by name only. Once any template finds helper
/// `shout` (next to itself, in a helper directory, or through the helper
/// directory scan) every later template of the same build uses that path,
/// whatever directory the later template lives in. Output for a template
/// that has its own `./shout` can therefore depend on compile order; use a
/// fresh `BuildCache` per independent build to avoid sharing.
#[derive(Debug, Default)]
pub struct BuildCache {
    known_helpers: KnownHelperSet,
    found_helpers: DashMap<String, PathBuf>,
    helper_dirs_scanned: AtomicBool,
}

impl BuildCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn known_helpers(&self) -> &KnownHelperSet {
        &self.known_helpers
    }

    /// Remember where helper `name` lives and mark it as known.
    pub fn record_helper(&self, name: &str, path: PathBuf) {
        self.known_helpers.insert(name);
        self.found_helpers.insert(name.to_string(), path);
    }

    #[must_use]
    pub fn found_helper(&self, name: &str) -> Option<PathBuf> {
        self.found_helpers.get(name).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn found_helper_count(&self) -> usize {
        self.found_helpers.len()
    }

    /// Claim the once-per-build helper directory scan. Returns `true` for the
    /// first caller only.
    pub fn claim_helper_dir_scan(&self) -> bool {
        !self.helper_dirs_scanned.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn helper_dirs_scanned(&self) -> bool {
        self.helper_dirs_scanned.load(Ordering::Acquire)
    }
}
