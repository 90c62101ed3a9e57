//! File system and path helpers shared by the cache, resolver and CLI.
//!
//! # Modules
//!
//! - [`fs`] - Directory creation and atomic writes
//! - [`path`] - Lexical normalization and forward-slash rendering
//!
//! # Example
//!
//! ```rust,no_run
//! use hbs_loader::utils::{atomic_write, normalize_path};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let target = normalize_path(Path::new(".cache/hbs/./entry.hbs.compiled"));
//! atomic_write(&target, b"module.exports = function(){return \"\";};")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;
pub mod path;

pub use fs::{atomic_write, ensure_dir};
pub use path::{normalize_path, normalize_path_for_storage};
