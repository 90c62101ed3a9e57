//! Logical symbol names versus ready-made module requests.

use crate::constants::DEPENDENCY_PREFIX;
use crate::symbols::SymbolKind;

/// A symbol name as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A template-level name such as `header` or `user/avatar`
    LogicalName(String),
    /// A module request written with the `$` prefix, e.g. `$ui-kit/button`
    ResolvedRequest(String),
}

impl Reference {
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.strip_prefix(DEPENDENCY_PREFIX) {
            Some(request) => Self::ResolvedRequest(request.to_string()),
            None => Self::LogicalName(name.to_string()),
        }
    }

    /// Module request to probe for this reference.
    ///
    /// Helper and ambiguous names stay bare when helper directories are
    /// configured, so each directory is probed for `<dir>/<name>`. Everything
    /// else is joined to `root_relative`.
    #[must_use]
    pub fn to_request(&self, kind: SymbolKind, root_relative: &str, has_helper_dirs: bool) -> String {
        match self {
            Self::ResolvedRequest(request) => request.clone(),
            Self::LogicalName(name) if kind != SymbolKind::Partial && has_helper_dirs => name.clone(),
            Self::LogicalName(name) => format!("{root_relative}{name}"),
        }
    }
}
