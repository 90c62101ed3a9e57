//! Command-line interface for the template loader.
//!
//! The binary exposes the loader to build scripts and to people debugging a
//! template setup outside of their bundler:
//!
//! ```bash
//! # Compile one template and print the module
//! hbs-loader compile src/views/page.hbs --helper-dir src/helpers
//!
//! # Compile several templates into a directory, sharing helper discovery
//! hbs-loader compile src/views/*.hbs --out-dir build/templates --cache .hbs-cache
//!
//! # Inspect or empty a cache directory
//! hbs-loader cache info .hbs-cache
//! hbs-loader cache clean .hbs-cache
//! ```
//!
//! # Logging
//!
//! Log output goes to stderr so module source on stdout stays clean.
//! `RUST_LOG` takes precedence over the flags; otherwise `--verbose` (or the
//! `debug` loader option) selects `debug`, `--quiet` selects `error` and the
//! default is `info`.

mod cache;
mod compile;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

pub use cache::CacheCommand;
pub use compile::CompileCommand;

/// Settings derived from the global flags.
///
/// Kept separate from [`Cli`] so tests can run commands with an explicit
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Log level for the subscriber, e.g. `"debug"`
    pub log_level: Option<String>,
    /// Suppress progress lines on stdout
    pub quiet: bool,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber.
    ///
    /// Does nothing when a subscriber is already installed.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            let Some(level) = &self.log_level else {
                return;
            };
            EnvFilter::new(level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Compile Handlebars templates into modules.
#[derive(Parser)]
#[command(
    name = "hbs-loader",
    about = "Compile Handlebars templates into modules with resolved partials and helpers",
    version,
    long_about = "hbs-loader precompiles Handlebars templates and rewrites every partial and helper it can find into a module dependency."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors and suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile templates into modules
    ///
    /// See [`CompileCommand`] for the accepted loader options.
    Compile(CompileCommand),

    /// Inspect or clean a module cache directory
    Cache(CacheCommand),
}

impl Cli {
    /// Run the selected subcommand.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate the global flags (and the merged `debug` loader option) into a
    /// [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let debug_option = matches!(&self.command, Commands::Compile(cmd) if cmd.debug_enabled());
        let log_level = if self.verbose || debug_option {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };

        CliConfig {
            log_level: Some(log_level.to_string()),
            quiet: self.quiet,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Compile(cmd) => cmd.execute(&config).await,
            Commands::Cache(cmd) => cmd.execute(&config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_levels() {
        let cli = Cli::parse_from(["hbs-loader", "cache", "info", "/tmp/x"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("info"));

        let cli = Cli::parse_from(["hbs-loader", "-v", "cache", "info", "/tmp/x"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["hbs-loader", "cache", "info", "/tmp/x", "--quiet"]);
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("error"));
        assert!(config.quiet);
    }

    #[test]
    fn test_debug_option_enables_debug_logging() {
        let cli = Cli::parse_from(["hbs-loader", "compile", "a.hbs", "--debug"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["hbs-loader", "compile", "a.hbs", "--query", "?debug"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("debug"));

        let cli = Cli::parse_from(["hbs-loader", "compile", "a.hbs", "--query", "?debug=false"]);
        assert_eq!(cli.build_config().log_level.as_deref(), Some("info"));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["hbs-loader", "-v", "-q", "cache", "info", "x"]).is_err());
    }

    #[test]
    fn test_compile_requires_template() {
        assert!(Cli::try_parse_from(["hbs-loader", "compile"]).is_err());
    }
}
