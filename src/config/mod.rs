//! Loader options.
//!
//! Options arrive in three shapes and end up in one validated value:
//!
//! 1. **Loader query** (`?{"helperDirs":["./helpers"]}` or `?helperDirs[]=./helpers`),
//!    parsed by [`query::parse_query`]
//! 2. **TOML file** (`hbs-loader.toml`), read by [`LoaderOptions::from_toml_file`]
//! 3. **CLI flags**, merged over the other two with [`LoaderOptions::merge`]
//!
//! [`LoaderConfig::from_options`] applies defaults, expands `~` and environment
//! variables in directory options, and compiles the regular expressions.
//!
//! # Option reference
//!
//! | Key                 | Type                 | Default                      |
//! |---------------------|----------------------|------------------------------|
//! | `cache`             | directory            | disabled                     |
//! | `extensions`        | list or `" ,;"` list | `.handlebars`, `.hbs`, `""`  |
//! | `rootRelative`      | string               | `./`                         |
//! | `knownHelpers`      | name or list         | none                         |
//! | `helperDirs`        | directory list       | none                         |
//! | `partialDirs`       | directory list       | none                         |
//! | `helperExtension`   | string               | `js`                         |
//! | `inlineRequires`    | regex                | disabled                     |
//! | `exclude`           | regex                | disabled                     |
//! | `runtime`           | module request       | `handlebars/runtime`         |
//! | `debug`             | bool                 | `false`                      |
//! | `root`              | directory            | none                         |
//! | `moduleDirectories` | list                 | `node_modules`               |
//!
//! ```toml
//! helperDirs = ["./src/helpers"]
//! knownHelpers = ["t", "formatDate"]
//! extensions = ".hbs"
//! cache = "~/.cache/hbs-loader"
//! ```

pub mod query;

use crate::constants::{
    DEFAULT_HELPER_EXTENSION, DEFAULT_MODULE_DIRECTORIES, DEFAULT_PARTIAL_EXTENSIONS,
    DEFAULT_ROOT_RELATIVE, DEFAULT_RUNTIME,
};
use crate::core::LoaderError;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use query::parse_query;

/// An option that accepts either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl StringList {
    /// The values as a list; a single string stays one entry.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value.clone()],
            Self::Many(values) => values.clone(),
        }
    }

    /// The values as a list; a single string is split on spaces, commas and
    /// semicolons, keeping empty pieces.
    #[must_use]
    pub fn to_split_vec(&self) -> Vec<String> {
        match self {
            Self::One(value) => value.split([' ', ',', ';']).map(str::to_string).collect(),
            Self::Many(values) => values.clone(),
        }
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Raw options as written by the user. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    /// Directory for memoized module output
    pub cache: Option<String>,
    /// Candidate partial extensions
    pub extensions: Option<StringList>,
    /// Prefix for logical names handed to the module resolver
    pub root_relative: Option<String>,
    /// Names to compile as helper calls
    pub known_helpers: Option<StringList>,
    /// Directories scanned for helper modules and searched for helpers
    pub helper_dirs: Option<StringList>,
    /// Extra directories searched for partials
    pub partial_dirs: Option<StringList>,
    /// Extension of helper modules in `helperDirs`
    pub helper_extension: Option<String>,
    /// Literal text matching this pattern becomes a module load
    pub inline_requires: Option<String>,
    /// Resolutions matching this pattern are discarded
    pub exclude: Option<String>,
    /// Module request of the template runtime
    pub runtime: Option<String>,
    /// Trace every compile pass and probe
    pub debug: Option<bool>,
    /// Project root stripped from template identifiers
    pub root: Option<String>,
    /// Module directory names stripped from template identifiers
    pub module_directories: Option<StringList>,
}

impl LoaderOptions {
    /// Options from a loader query string.
    pub fn from_query(query: &str) -> Result<Self, LoaderError> {
        let map = parse_query(query)?;
        serde_json::from_value(serde_json::Value::Object(map)).map_err(|e| {
            LoaderError::InvalidOption {
                option: "query".to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Options from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Overlay `other` on `self`: every option `other` sets wins.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            cache: other.cache.or(self.cache),
            extensions: other.extensions.or(self.extensions),
            root_relative: other.root_relative.or(self.root_relative),
            known_helpers: other.known_helpers.or(self.known_helpers),
            helper_dirs: other.helper_dirs.or(self.helper_dirs),
            partial_dirs: other.partial_dirs.or(self.partial_dirs),
            helper_extension: other.helper_extension.or(self.helper_extension),
            inline_requires: other.inline_requires.or(self.inline_requires),
            exclude: other.exclude.or(self.exclude),
            runtime: other.runtime.or(self.runtime),
            debug: other.debug.or(self.debug),
            root: other.root.or(self.root),
            module_directories: other.module_directories.or(self.module_directories),
        }
    }
}

/// Validated options with defaults applied.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub cache_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub root_relative: String,
    pub known_helpers: Vec<String>,
    pub helper_dirs: Vec<PathBuf>,
    pub partial_dirs: Vec<PathBuf>,
    pub helper_extension: String,
    pub inline_requires: Option<Regex>,
    pub exclude: Option<Regex>,
    /// `None` means the default runtime
    pub runtime: Option<String>,
    pub debug: bool,
    pub root: Option<String>,
    pub module_directories: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            extensions: DEFAULT_PARTIAL_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            root_relative: DEFAULT_ROOT_RELATIVE.to_string(),
            known_helpers: Vec::new(),
            helper_dirs: Vec::new(),
            partial_dirs: Vec::new(),
            helper_extension: DEFAULT_HELPER_EXTENSION.to_string(),
            inline_requires: None,
            exclude: None,
            runtime: None,
            debug: false,
            root: None,
            module_directories: DEFAULT_MODULE_DIRECTORIES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl LoaderConfig {
    pub fn from_options(options: &LoaderOptions) -> Result<Self, LoaderError> {
        let defaults = Self::default();

        let extensions = options
            .extensions
            .as_ref()
            .map_or(defaults.extensions, StringList::to_split_vec);

        let helper_extension = match &options.helper_extension {
            Some(ext) => {
                let ext = ext.trim_start_matches('.');
                if ext.is_empty() || ext.contains(['/', '\\', '*']) {
                    return Err(LoaderError::InvalidOption {
                        option: "helperExtension".to_string(),
                        reason: format!("'{ext}' is not a file extension"),
                    });
                }
                ext.to_string()
            }
            None => defaults.helper_extension,
        };

        let expand_dirs = |option: &str, list: &Option<StringList>| -> Result<Vec<PathBuf>, LoaderError> {
            list.as_ref()
                .map(StringList::to_vec)
                .unwrap_or_default()
                .iter()
                .filter(|dir| !dir.is_empty())
                .map(|dir| expand(option, dir).map(PathBuf::from))
                .collect()
        };

        Ok(Self {
            cache_dir: options
                .cache
                .as_deref()
                .map(|dir| expand("cache", dir).map(PathBuf::from))
                .transpose()?,
            extensions,
            root_relative: options.root_relative.clone().unwrap_or(defaults.root_relative),
            known_helpers: options.known_helpers.as_ref().map(StringList::to_vec).unwrap_or_default(),
            helper_dirs: expand_dirs("helperDirs", &options.helper_dirs)?,
            partial_dirs: expand_dirs("partialDirs", &options.partial_dirs)?,
            helper_extension,
            inline_requires: compile_pattern("inlineRequires", options.inline_requires.as_deref())?,
            exclude: compile_pattern("exclude", options.exclude.as_deref())?,
            runtime: options.runtime.as_deref().map(|r| expand("runtime", r)).transpose()?,
            debug: options.debug.unwrap_or(false),
            root: options.root.as_deref().map(|r| expand("root", r)).transpose()?,
            module_directories: options
                .module_directories
                .as_ref()
                .map_or(defaults.module_directories, StringList::to_vec),
        })
    }

    /// Unknown helpers with arguments are rejected once helper directories
    /// scope the set of helpers.
    #[must_use]
    pub fn known_helpers_only(&self) -> bool {
        !self.helper_dirs.is_empty()
    }

    /// Module request for the template runtime.
    #[must_use]
    pub fn runtime_request(&self) -> &str {
        self.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME)
    }
}

fn expand(option: &str, value: &str) -> Result<String, LoaderError> {
    shellexpand::full(value).map(|v| v.into_owned()).map_err(|e| LoaderError::InvalidOption {
        option: option.to_string(),
        reason: e.to_string(),
    })
}

fn compile_pattern(option: &str, pattern: Option<&str>) -> Result<Option<Regex>, LoaderError> {
    match pattern {
        None | Some("") => Ok(None),
        Some(pattern) => Regex::new(pattern).map(Some).map_err(|e| LoaderError::InvalidPattern {
            option: option.to_string(),
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }),
    }
}
