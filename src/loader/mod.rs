//! The template loader: one compilation job per template.
//!
//! A job runs these steps:
//!
//! 1. serve the module from the on-disk cache when a fresh entry exists
//! 2. check that the template runtime matches the compiler revision
//! 3. seed the [`KnownHelperSet`](crate::symbols::KnownHelperSet) with builtin
//!    and configured helpers, and scan helper directories (once per build)
//! 4. run the [`FixedPointCompiler`] until no new symbol resolves
//! 5. wrap the compiled code with the [`Emitter`] and store it in the cache
//!
//! Jobs of one build share a [`BuildCache`] so helpers found for one template
//! are not searched for again.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hbs_loader::config::{LoaderConfig, LoaderOptions};
//! use hbs_loader::loader::Loader;
//! use hbs_loader::symbols::BuildCache;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let options = LoaderOptions::from_query("?helperDirs[]=./src/helpers")?;
//! let config = LoaderConfig::from_options(&options)?;
//! let loader = Loader::new(config, Arc::new(BuildCache::new()));
//!
//! let output = loader.load_file(Path::new("src/views/page.hbs")).await?;
//! println!("{}", output.module);
//! # Ok(())
//! # }
//! ```

pub mod emitter;
pub mod fixed_point;
pub mod hook;

use crate::cache::TemplateCache;
use crate::compiler::{HandlebarsCompiler, TemplateCompiler};
use crate::config::LoaderConfig;
use crate::core::LoaderError;
use crate::resolver::{FsModuleResolver, ModuleResolver, Resolver, scan_helper_dirs};
use crate::symbols::BuildCache;
use crate::utils::normalize_path_for_storage;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use emitter::{BLANK_MODULE, Emitter};
pub use fixed_point::{FixedPointCompiler, LoopOutcome, LoopState};
pub use hook::LoaderHooks;

/// Result of one compilation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutput {
    /// Module source handed to the build tool
    pub module: String,
    /// Files the module loads (resolved partials and helpers)
    pub dependencies: Vec<PathBuf>,
    /// Compile passes performed; `0` for a cache hit
    pub passes: usize,
    pub from_cache: bool,
}

pub struct Loader<R: ModuleResolver = FsModuleResolver, C: TemplateCompiler = HandlebarsCompiler> {
    config: LoaderConfig,
    build: Arc<BuildCache>,
    compiler: C,
    module_resolver: R,
    emitter: Emitter,
    cache: Option<TemplateCache>,
}

impl Loader {
    /// A loader with the built-in compiler and file system resolution.
    pub fn new(config: LoaderConfig, build: Arc<BuildCache>) -> Self {
        let module_resolver =
            FsModuleResolver::new().with_module_directories(config.module_directories.clone());
        Self::with_parts(config, build, HandlebarsCompiler::new(), module_resolver)
    }
}

impl<R: ModuleResolver, C: TemplateCompiler> Loader<R, C> {
    pub fn with_parts(config: LoaderConfig, build: Arc<BuildCache>, compiler: C, module_resolver: R) -> Self {
        let emitter = Emitter::new(&config);
        let cache = config.cache_dir.clone().map(TemplateCache::new);
        Self {
            config,
            build,
            compiler,
            module_resolver,
            emitter,
            cache,
        }
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn build_cache(&self) -> &Arc<BuildCache> {
        &self.build
    }

    /// Read and compile the template at `resource_path`.
    pub async fn load_file(&self, resource_path: &Path) -> Result<LoadOutput, LoaderError> {
        let source = tokio::fs::read_to_string(resource_path).await.map_err(|e| {
            LoaderError::FileSystemError {
                operation: format!("reading template ({e})"),
                path: resource_path.display().to_string(),
            }
        })?;
        self.load(&source, resource_path).await
    }

    /// Compile `source`, treating `resource_path` as its location.
    ///
    /// Relative partial and helper names resolve against the directory of
    /// `resource_path`.
    pub async fn load(&self, source: &str, resource_path: &Path) -> Result<LoadOutput, LoaderError> {
        let template_name = normalize_path_for_storage(resource_path);

        if let Some(cache) = &self.cache {
            match cache.lookup(resource_path) {
                Ok(Some(module)) => {
                    info!("Fetched HBS slug from cache: {}", template_name);
                    return Ok(LoadOutput {
                        module,
                        dependencies: Vec::new(),
                        passes: 0,
                        from_cache: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable cache entry for {}: {}", template_name, e),
            }
        }

        self.check_runtime_version().await?;
        self.seed_known_helpers().await;

        let template_dir = resource_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let resolver = Resolver::new(&self.module_resolver, &self.config, template_dir);
        let outcome = FixedPointCompiler::new(
            &self.compiler,
            resolver,
            &self.build,
            &self.config,
            template_name.clone(),
        )
        .run(source)
        .await?;

        let module = self.emitter.emit(&outcome.code, resource_path);

        if let Some(cache) = &self.cache {
            let entry = cache.store(resource_path, &module)?;
            debug!("Cached {} as {}", template_name, entry.display());
        }

        Ok(LoadOutput {
            module,
            dependencies: outcome.table.dependencies(),
            passes: outcome.passes,
            from_cache: false,
        })
    }

    async fn seed_known_helpers(&self) {
        let known = self.build.known_helpers();
        for name in self.compiler.builtin_helpers() {
            known.insert(name);
        }
        for name in &self.config.known_helpers {
            known.insert(name);
        }
        let registered =
            scan_helper_dirs(&self.config.helper_dirs, &self.config.helper_extension, &self.build).await;
        if registered > 0 {
            debug!("Registered {} helper(s) from helper directories", registered);
        }
    }

    /// Compare the compiler revision with the one an overridden runtime
    /// declares. The default runtime always matches.
    async fn check_runtime_version(&self) -> Result<(), LoaderError> {
        let Some(runtime) = &self.config.runtime else {
            return Ok(());
        };
        let content = match tokio::fs::read_to_string(runtime).await {
            Ok(content) => content,
            Err(e) => {
                debug!("Runtime {} is not a readable file ({}); skipping version check", runtime, e);
                return Ok(());
            }
        };

        let Some(revision) = declared_revision(&content) else {
            debug!("Runtime {} declares no COMPILER_REVISION", runtime);
            return Ok(());
        };
        if revision != self.compiler.revision() {
            return Err(LoaderError::VersionMismatch {
                compiler: self.compiler.revision(),
                runtime: revision,
                runtime_path: runtime.clone(),
            });
        }
        Ok(())
    }
}

/// The `COMPILER_REVISION = N` value declared in runtime source.
fn declared_revision(source: &str) -> Option<u32> {
    let pattern = Regex::new(r"COMPILER_REVISION\s*=\s*(\d+)").ok()?;
    pattern.captures(source)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderOptions;
    use std::fs;
    use tempfile::TempDir;

    fn loader(options: LoaderOptions) -> Loader {
        Loader::new(LoaderConfig::from_options(&options).unwrap(), Arc::new(BuildCache::new()))
    }

    #[test]
    fn test_declared_revision() {
        assert_eq!(declared_revision("var COMPILER_REVISION = 8;"), Some(8));
        assert_eq!(declared_revision("exports.COMPILER_REVISION=7"), Some(7));
        assert_eq!(declared_revision("nothing here"), None);
    }

    #[tokio::test]
    async fn test_version_mismatch_is_fatal() {
        let temp = TempDir::new().unwrap();
        let runtime = temp.path().join("runtime.js");
        fs::write(&runtime, "var COMPILER_REVISION = 7;").unwrap();

        let loader = loader(LoaderOptions {
            runtime: Some(runtime.to_string_lossy().into_owned()),
            ..Default::default()
        });
        let err = loader.load("<p></p>", &temp.path().join("a.hbs")).await.unwrap_err();
        assert!(matches!(err, LoaderError::VersionMismatch { compiler: 8, runtime: 7, .. }));
    }

    #[tokio::test]
    async fn test_matching_runtime_is_used_in_module() {
        let temp = TempDir::new().unwrap();
        let runtime = temp.path().join("runtime.js");
        fs::write(&runtime, "var COMPILER_REVISION = 8;").unwrap();
        let runtime = runtime.to_string_lossy().into_owned();

        let loader = loader(LoaderOptions {
            runtime: Some(runtime.clone()),
            ..Default::default()
        });
        let output = loader.load("<p></p>", &temp.path().join("a.hbs")).await.unwrap();
        assert!(output.module.starts_with(&format!("var Handlebars = require({runtime:?});")));
    }

    #[tokio::test]
    async fn test_builtins_are_seeded() {
        let temp = TempDir::new().unwrap();
        let loader = loader(LoaderOptions {
            known_helpers: Some(crate::config::StringList::One("t".to_string())),
            ..Default::default()
        });
        loader.load("x", &temp.path().join("a.hbs")).await.unwrap();
        let known = loader.build_cache().known_helpers();
        assert!(known.contains("each"));
        assert!(known.contains("t"));
    }

    #[tokio::test]
    async fn test_blank_source() {
        let temp = TempDir::new().unwrap();
        let output = loader(LoaderOptions::default()).load("", &temp.path().join("a.hbs")).await.unwrap();
        assert_eq!(output.module, BLANK_MODULE);
        assert!(output.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_load_file_missing() {
        let temp = TempDir::new().unwrap();
        let err = loader(LoaderOptions::default()).load_file(&temp.path().join("nope.hbs")).await.unwrap_err();
        assert!(matches!(err, LoaderError::FileSystemError { .. }));
    }
}
