//! Module resolution within one directory.
//!
//! The resolver decides *where* to look and in which order; a
//! [`ModuleResolver`] answers "does `request` exist relative to `base_dir`".
//! [`FsModuleResolver`] implements the usual bundler rules against the local
//! file system.

use crate::constants::{DEFAULT_MODULE_DIRECTORIES, DEFAULT_MODULE_EXTENSIONS};
use crate::utils::normalize_path;
use std::ffi::OsString;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure of a single probe. The caller moves on to its next search context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Cannot resolve '{request}' in {}", base.display())]
    NotFound { base: PathBuf, request: String },

    #[error("Cannot access {}: {reason}", path.display())]
    Access { path: PathBuf, reason: String },
}

/// Resolves module requests relative to a directory.
pub trait ModuleResolver: Send + Sync {
    fn resolve(
        &self,
        base_dir: &Path,
        request: &str,
    ) -> impl Future<Output = Result<PathBuf, ProbeError>> + Send;
}

/// File system module resolution.
///
/// - `./x`, `../x` and absolute requests are joined to the base directory
/// - bare requests are tried in the base directory, then in every module
///   directory (`node_modules`) of the base directory and its ancestors
/// - each candidate is tried with every extension, then as a directory
///   containing `index` plus an extension
#[derive(Debug, Clone)]
pub struct FsModuleResolver {
    extensions: Vec<String>,
    module_directories: Vec<String>,
}

impl Default for FsModuleResolver {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MODULE_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            module_directories: DEFAULT_MODULE_DIRECTORIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl FsModuleResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module_directories(mut self, directories: Vec<String>) -> Self {
        self.module_directories = directories;
        self
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    fn candidate_roots(&self, base_dir: &Path, request: &str) -> Vec<PathBuf> {
        let direct = normalize_path(&base_dir.join(request));
        if is_path_request(request) {
            return vec![direct];
        }

        let mut roots = vec![direct];
        for ancestor in base_dir.ancestors() {
            for directory in &self.module_directories {
                roots.push(normalize_path(&ancestor.join(directory).join(request)));
            }
        }
        roots
    }

    async fn probe_file(&self, root: &Path) -> Result<Option<PathBuf>, ProbeError> {
        for extension in &self.extensions {
            let mut candidate = OsString::from(root.as_os_str());
            candidate.push(extension);
            let candidate = PathBuf::from(candidate);
            if is_file(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        for extension in &self.extensions {
            let candidate = root.join(format!("index{extension}"));
            if is_file(&candidate).await? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

impl ModuleResolver for FsModuleResolver {
    async fn resolve(&self, base_dir: &Path, request: &str) -> Result<PathBuf, ProbeError> {
        for root in self.candidate_roots(base_dir, request) {
            if let Some(found) = self.probe_file(&root).await? {
                return Ok(found);
            }
        }
        Err(ProbeError::NotFound {
            base: base_dir.to_path_buf(),
            request: request.to_string(),
        })
    }
}

fn is_path_request(request: &str) -> bool {
    request == "."
        || request == ".."
        || request.starts_with("./")
        || request.starts_with("../")
        || Path::new(request).is_absolute()
        || request.starts_with('/')
}

async fn is_file(path: &Path) -> Result<bool, ProbeError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(false),
        Err(e) => Err(ProbeError::Access {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
