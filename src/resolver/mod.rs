//! Symbol resolution against ordered search contexts.
//!
//! The resolver turns a symbol name into a file by probing a list of
//! directories through a [`ModuleResolver`]. It owns the *order* and the
//! *filtering* of probes; what counts as a match inside one directory is the
//! module resolver's business.
//!
//! # Search contexts
//!
//! | Kind                  | Contexts, in order                          |
//! |-----------------------|---------------------------------------------|
//! | Partial               | template directory, then `partialDirs`      |
//! | Helper / Ambiguous    | template directory, then `helperDirs`       |
//!
//! # Partial extensions
//!
//! Partials are probed with each candidate extension. The extension loop is
//! the outer one: with contexts `[A, B]` and extensions `[".hbs", ""]` the
//! probe order is `A/foo.hbs`, `B/foo.hbs`, `A/foo`, `B/foo`. A `.hbs` file in
//! a later context therefore beats an extension-less file in an earlier one.
//!
//! # Failures
//!
//! - A probe error means "not here"; the next context is tried.
//! - A match accepted by the `exclude` pattern is discarded the same way.
//! - A missing partial is fatal ([`LoaderError::PartialNotFound`]); a missing
//!   helper is simply `None`.

pub mod helper_dirs;
pub mod module_resolver;
pub mod reference;

use crate::config::LoaderConfig;
use crate::core::LoaderError;
use crate::symbols::SymbolKind;
use crate::utils::normalize_path_for_storage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use strsim::levenshtein;
use tracing::{debug, trace};

pub use helper_dirs::scan_helper_dirs;
pub use module_resolver::{FsModuleResolver, ModuleResolver, ProbeError};
pub use reference::Reference;

/// Maximum edit distance, as a percentage of the name length, for a file to
/// be suggested in place of a missing partial.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Resolves the symbols of one template.
pub struct Resolver<'a, R: ModuleResolver> {
    module_resolver: &'a R,
    config: &'a LoaderConfig,
    template_dir: PathBuf,
}

impl<'a, R: ModuleResolver> Resolver<'a, R> {
    pub fn new(module_resolver: &'a R, config: &'a LoaderConfig, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            module_resolver,
            config,
            template_dir: template_dir.into(),
        }
    }

    /// Directories probed for `kind`, in order.
    #[must_use]
    pub fn contexts(&self, kind: SymbolKind) -> Vec<&Path> {
        let extra = match kind {
            SymbolKind::Partial => &self.config.partial_dirs,
            SymbolKind::Helper | SymbolKind::Ambiguous => &self.config.helper_dirs,
        };
        std::iter::once(self.template_dir.as_path()).chain(extra.iter().map(PathBuf::as_path)).collect()
    }

    /// Module request for a symbol name.
    #[must_use]
    pub fn request_for(&self, kind: SymbolKind, name: &str) -> String {
        Reference::parse(name).to_request(
            kind,
            &self.config.root_relative,
            !self.config.helper_dirs.is_empty(),
        )
    }

    /// Find the file behind `name`, or `None` when no context has it.
    pub async fn resolve(&self, kind: SymbolKind, name: &str) -> Option<PathBuf> {
        let request = self.request_for(kind, name);

        if kind != SymbolKind::Partial {
            return self.probe_contexts(kind, &request).await;
        }

        for extension in &self.config.extensions {
            let candidate = format!("{request}{extension}");
            if let Some(found) = self.probe_contexts(kind, &candidate).await {
                return Some(found);
            }
        }
        None
    }

    /// Like [`Resolver::resolve`] for a partial, with a missing partial as an
    /// error carrying near-miss suggestions.
    pub async fn resolve_partial(&self, name: &str) -> Result<PathBuf, LoaderError> {
        match self.resolve(SymbolKind::Partial, name).await {
            Some(path) => Ok(path),
            None => Err(LoaderError::PartialNotFound {
                name: name.to_string(),
                suggestions: self.suggest_partials(name).await,
            }),
        }
    }

    async fn probe_contexts(&self, kind: SymbolKind, request: &str) -> Option<PathBuf> {
        for context in self.contexts(kind) {
            if self.config.debug {
                debug!("Attempting to resolve {} {} in {}", kind, request, context.display());
            }
            match self.module_resolver.resolve(context, request).await {
                Ok(found) => {
                    let rendered = normalize_path_for_storage(&found);
                    if self.config.exclude.as_ref().is_some_and(|rx| rx.is_match(&rendered)) {
                        if self.config.debug {
                            debug!("Excluding {} {}", kind, rendered);
                        }
                        continue;
                    }
                    if self.config.debug {
                        debug!("Resolved {} {} to {}", kind, request, rendered);
                    }
                    return Some(found);
                }
                Err(e) => trace!("{}", e),
            }
        }
        if self.config.debug {
            debug!("Failed to resolve {} {}", kind, request);
        }
        None
    }

    /// Existing partial-like files whose names are close to `name`.
    async fn suggest_partials(&self, name: &str) -> Vec<String> {
        let (prefix, _) = name.rsplit_once('/').unwrap_or(("", name));
        let mut available = BTreeSet::new();

        for context in self.contexts(SymbolKind::Partial) {
            let dir = if prefix.is_empty() {
                context.to_path_buf()
            } else {
                context.join(prefix)
            };
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                let Some(stem) = self
                    .config
                    .extensions
                    .iter()
                    .filter(|ext| !ext.is_empty())
                    .find_map(|ext| file_name.strip_suffix(ext.as_str()))
                else {
                    continue;
                };
                let candidate =
                    if prefix.is_empty() { stem.to_string() } else { format!("{prefix}/{stem}") };
                if candidate != name {
                    available.insert(candidate);
                }
            }
        }

        let mut scored: Vec<_> =
            available.into_iter().map(|candidate| (levenshtein(name, &candidate), candidate)).collect();
        scored.sort();
        scored
            .into_iter()
            .filter(|(distance, _)| *distance <= name.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .take(3)
            .map(|(_, candidate)| candidate)
            .collect()
    }
}
