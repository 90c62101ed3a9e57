//! hbs-loader - Handlebars template loader
//!
//! Compiles Handlebars templates into loadable modules and turns every partial
//! and helper the template references into a module dependency, without the
//! template author declaring those dependencies anywhere.
//!
//! # Architecture Overview
//!
//! A template is compiled repeatedly until a fixed point is reached:
//!
//! 1. the compiler reports each symbol reference (partial, helper, context
//!    lookup) to a naming hook
//! 2. the hook rewrites references that are already resolved into module
//!    loads and records the rest as pending
//! 3. pending symbols are searched for on disk
//! 4. if anything new was found, the template is compiled again
//!
//! A helper that cannot be found is not an error: it stays a runtime lookup
//! and the template treats it as data. A partial that cannot be found fails
//! the job.
//!
//! ## Key Features
//!
//! - **Implicit dependencies**: partials and helpers are discovered, not declared
//! - **Ambiguity handling**: `{{title}}` becomes a helper call only when a
//!   `title` helper module exists
//! - **Search paths**: template directory, `partialDirs`, `helperDirs` and
//!   `node_modules` resolution with several candidate extensions
//! - **Caching**: emitted modules are memoized on disk and reused while
//!   newer than their template
//!
//! # Core Modules
//!
//! - [`compiler`] - Handlebars-syntax precompiler with code generation hooks
//! - [`symbols`] - Per-job symbol table and the build-wide helper registry
//! - [`resolver`] - Search contexts, candidate extensions and module resolution
//! - [`loader`] - Naming hook, fixed-point loop, module emitter and job driver
//!
//! ## Supporting Modules
//!
//! - [`cache`] - On-disk cache of emitted modules
//! - [`config`] - Loader options from queries, TOML files and CLI flags
//! - [`core`] - Error types and user-facing error reporting
//! - [`cli`] - The `hbs-loader` command-line interface
//! - [`utils`] - File system and path helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use hbs_loader::config::{LoaderConfig, LoaderOptions};
//! use hbs_loader::loader::Loader;
//! use hbs_loader::symbols::BuildCache;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = LoaderConfig::from_options(&LoaderOptions::default())?;
//! let loader = Loader::new(config, Arc::new(BuildCache::new()));
//! let output = loader.load("<h1>{{> header}}</h1>", Path::new("/src/page.hbs")).await?;
//! for dependency in &output.dependencies {
//!     println!("depends on {}", dependency.display());
//! }
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod compiler;
pub mod loader;
pub mod resolver;
pub mod symbols;

// Supporting modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
