//! Error handling for the template loader
//!
//! This module provides the error types and user-friendly error reporting for
//! the loader. The error system follows two principles:
//! 1. **Strongly-typed errors** for precise handling in library code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`LoaderError`] - Enumerated fatal conditions of a compilation job
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Fatal vs. non-fatal outcomes
//!
//! Only the conditions listed in [`LoaderError`] abort a job. A helper (or an
//! ambiguous context lookup) that cannot be resolved is *not* an error: it is
//! recorded in the symbol table and treated as ordinary template data. A probe
//! failure reported by the module resolver for one search context is not an
//! error either; the resolver simply moves on to the next context.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hbs_loader::core::{LoaderError, user_friendly_error};
//!
//! let error = LoaderError::PartialNotFound {
//!     name: "header".to_string(),
//!     suggestions: vec!["headers".to_string()],
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The fatal error type of a template compilation job.
///
/// Every variant short-circuits the fixed-point loop and is delivered once to
/// the caller of the job. No module source is ever produced on these paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// The template compiler and the template runtime disagree on the
    /// compiled-code revision. Raised before any compilation happens.
    #[error(
        "Handlebars compiler version does not match runtime version (compiler revision {compiler}, runtime revision {runtime} in {runtime_path})"
    )]
    VersionMismatch {
        /// Revision emitted by the compiler
        compiler: u32,
        /// Revision declared by the runtime module
        runtime: u32,
        /// Path of the runtime module that was inspected
        runtime_path: String,
    },

    /// The template compiler rejected the source text.
    #[error("Template syntax error in {template}: {message} (line {line}, column {column})")]
    TemplateSyntaxError {
        /// Template that failed to compile
        template: String,
        /// Message reported by the compiler
        message: String,
        /// 1-based line of the offending token
        line: usize,
        /// 1-based column of the offending token
        column: usize,
    },

    /// A partial could not be found in any search context with any of the
    /// candidate extensions.
    #[error("Partial '{name}' not found")]
    PartialNotFound {
        /// Logical name of the partial as written in the template
        name: String,
        /// Existing files whose names are close to the requested one
        suggestions: Vec<String>,
    },

    /// An option carried a value the loader cannot use.
    #[error("Invalid value for option '{option}': {reason}")]
    InvalidOption {
        /// Option name as spelled in the query
        option: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A regular expression option failed to compile.
    #[error("Invalid regular expression for option '{option}': {reason}")]
    InvalidPattern {
        /// Option name as spelled in the query
        option: String,
        /// The pattern as given
        pattern: String,
        /// Compiler message from the regex crate
        reason: String,
    },

    /// Reading or writing the on-disk output cache failed.
    #[error("Cache operation failed for {path}: {reason}")]
    CacheError {
        /// Cache entry or directory involved
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A file needed by the job could not be read.
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// What the loader was doing
        operation: String,
        /// Path involved
        path: String,
    },

    /// Catch-all used by [`user_friendly_error`] for foreign errors.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// Error context wrapper that provides user-friendly error information
///
/// Suggestions are displayed in green, details in yellow and the error itself
/// in bold red when printed with [`ErrorContext::display`].
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying loader error
    pub error: LoaderError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`LoaderError`]
    #[must_use]
    pub const fn new(error: LoaderError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognises [`LoaderError`] anywhere in the error chain, I/O errors and TOML
/// parse errors; everything else is reported with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(loader_error) = error.chain().find_map(|e| e.downcast_ref::<LoaderError>()) {
        return create_error_context(loader_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(LoaderError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check file ownership and permissions of the template and cache directories")
                .with_details("The loader could not read or write a file it needs");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(LoaderError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the template file exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(LoaderError::InvalidOption {
            option: "config".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the loader configuration file");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(LoaderError::Other {
        message,
    })
}

/// Map each [`LoaderError`] variant to a context with tailored suggestions.
fn create_error_context(error: LoaderError) -> ErrorContext {
    match &error {
        LoaderError::VersionMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Install a runtime that matches the compiler or point the `runtime` option at a compatible build",
            )
            .with_details(
                "Templates compiled for one revision cannot be executed by a runtime of another revision",
            ),
        LoaderError::TemplateSyntaxError {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Check that every {{#block}} has a matching {{/block}} and that all mustaches are closed",
        ),
        LoaderError::PartialNotFound {
            suggestions,
            ..
        } => {
            let suggestion = if suggestions.is_empty() {
                "Check the partial name, the `extensions` option and the `partialDirs` option".to_string()
            } else {
                format!("Did you mean: {}?", suggestions.join(", "))
            };
            ErrorContext::new(error.clone())
                .with_suggestion(suggestion)
                .with_details(
                    "Partials are searched relative to the template directory with every configured extension",
                )
        }
        LoaderError::InvalidPattern {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Patterns use Rust regex syntax; escape literal dots and slashes"),
        LoaderError::CacheError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove the cache directory with `hbs-loader cache clean <DIR>` and retry"),
        _ => ErrorContext::new(error),
    }
}
