//! The `compile` subcommand.
//!
//! Options are layered, later sources winning:
//!
//! 1. `hbs-loader.toml` in the working directory, or the file named by `--config`
//! 2. the loader query given with `--query`
//! 3. individual flags
//!
//! All templates of one invocation share a single [`BuildCache`], so helpers
//! discovered for the first template are reused by the rest.

use super::CliConfig;
use crate::config::{LoaderConfig, LoaderOptions, StringList};
use crate::constants::CONFIG_FILE_NAME;
use crate::loader::Loader;
use crate::symbols::BuildCache;
use crate::utils::{atomic_write, ensure_dir};
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Args, Debug, Default)]
pub struct CompileCommand {
    /// Template files to compile
    #[arg(required = true, value_name = "TEMPLATE")]
    templates: Vec<PathBuf>,

    /// Loader options file (TOML)
    #[arg(long, value_name = "FILE", env = "HBS_LOADER_CONFIG")]
    config: Option<PathBuf>,

    /// Loader query, e.g. `?helperDirs[]=./helpers&debug`
    #[arg(long, value_name = "QUERY", allow_hyphen_values = true)]
    query: Option<String>,

    /// Directory for cached module output
    #[arg(long, value_name = "DIR")]
    cache: Option<String>,

    /// Candidate partial extensions, separated by spaces, commas or semicolons
    #[arg(long, value_name = "LIST", allow_hyphen_values = true)]
    extensions: Option<String>,

    /// Prefix for partial and helper names handed to the module resolver
    #[arg(long, value_name = "PREFIX")]
    root_relative: Option<String>,

    /// Name to compile as a helper call (repeatable)
    #[arg(long = "known-helper", value_name = "NAME")]
    known_helpers: Vec<String>,

    /// Directory of helper modules (repeatable)
    #[arg(long = "helper-dir", value_name = "DIR")]
    helper_dirs: Vec<String>,

    /// Extra directory searched for partials (repeatable)
    #[arg(long = "partial-dir", value_name = "DIR")]
    partial_dirs: Vec<String>,

    /// Extension of helper modules in helper directories
    #[arg(long, value_name = "EXT")]
    helper_extension: Option<String>,

    /// Turn matching literal text into module loads
    #[arg(long, value_name = "REGEX")]
    inline_requires: Option<String>,

    /// Discard resolutions whose path matches
    #[arg(long, value_name = "REGEX")]
    exclude: Option<String>,

    /// Module request of the template runtime
    #[arg(long, value_name = "REQUEST")]
    runtime: Option<String>,

    /// Project root stripped from template identifiers
    #[arg(long, value_name = "DIR")]
    root: Option<String>,

    /// Trace every compile pass and probe
    #[arg(long)]
    debug: bool,

    /// Write `<stem>.js` files here instead of printing to stdout
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

impl CompileCommand {
    /// Whether the merged options (file, query and flags) ask for debug
    /// tracing. Unreadable options count as `false`; `execute` reports them.
    pub(crate) fn debug_enabled(&self) -> bool {
        self.debug || self.loader_options().ok().and_then(|options| options.debug).unwrap_or(false)
    }

    pub async fn execute(self, cli_config: &CliConfig) -> Result<()> {
        if self.out_dir.is_none() && self.templates.len() > 1 {
            bail!("--out-dir is required when compiling more than one template");
        }

        let options = self.loader_options()?;
        let config = LoaderConfig::from_options(&options)?;
        let loader = Loader::new(config, Arc::new(BuildCache::new()));

        if let Some(out_dir) = &self.out_dir {
            ensure_dir(out_dir)?;
        }

        for template in &self.templates {
            let resource_path = std::path::absolute(template)
                .with_context(|| format!("Invalid template path: {}", template.display()))?;
            let output = loader.load_file(&resource_path).await?;
            debug!(
                "Compiled {} in {} pass(es), {} dependencies",
                resource_path.display(),
                output.passes,
                output.dependencies.len()
            );

            match &self.out_dir {
                None => println!("{}", output.module),
                Some(out_dir) => {
                    let target = out_dir.join(output_file_name(template));
                    atomic_write(&target, output.module.as_bytes())?;
                    info!("Wrote {}", target.display());
                    if !cli_config.quiet {
                        let note = if output.from_cache { " (cached)" } else { "" };
                        println!(
                            "{} {} -> {}{}",
                            "✓".green(),
                            template.display(),
                            target.display(),
                            note.dimmed()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Options file, then query, then flags.
    fn loader_options(&self) -> Result<LoaderOptions> {
        let mut options = match &self.config {
            Some(path) => LoaderOptions::from_toml_file(path)?,
            None => {
                let default_file = Path::new(CONFIG_FILE_NAME);
                if default_file.is_file() {
                    LoaderOptions::from_toml_file(default_file)?
                } else {
                    LoaderOptions::default()
                }
            }
        };

        if let Some(query) = &self.query {
            options = options.merge(LoaderOptions::from_query(query)?);
        }

        Ok(options.merge(self.flag_options()))
    }

    fn flag_options(&self) -> LoaderOptions {
        let list = |values: &[String]| (!values.is_empty()).then(|| StringList::Many(values.to_vec()));

        LoaderOptions {
            cache: self.cache.clone(),
            extensions: self.extensions.clone().map(StringList::One),
            root_relative: self.root_relative.clone(),
            known_helpers: list(&self.known_helpers),
            helper_dirs: list(&self.helper_dirs),
            partial_dirs: list(&self.partial_dirs),
            helper_extension: self.helper_extension.clone(),
            inline_requires: self.inline_requires.clone(),
            exclude: self.exclude.clone(),
            runtime: self.runtime.clone(),
            debug: self.debug.then_some(true),
            root: self.root.clone(),
            module_directories: None,
        }
    }
}

fn output_file_name(template: &Path) -> String {
    let stem = template.file_stem().map_or_else(|| "template".into(), |s| s.to_string_lossy());
    format!("{stem}.js")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name(Path::new("views/page.hbs")), "page.js");
        assert_eq!(output_file_name(Path::new("views/page.min.handlebars")), "page.min.js");
    }

    #[test]
    fn test_flags_override_query_and_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("loader.toml");
        fs::write(&file, "runtime = \"file-runtime\"\nrootRelative = \"/file/\"\nexclude = \"file\"").unwrap();

        let cmd = CompileCommand {
            templates: vec![PathBuf::from("a.hbs")],
            config: Some(file),
            query: Some("?exclude=query&knownHelpers[]=t".to_string()),
            runtime: Some("flag-runtime".to_string()),
            ..Default::default()
        };
        let options = cmd.loader_options().unwrap();
        assert_eq!(options.runtime.as_deref(), Some("flag-runtime"));
        assert_eq!(options.root_relative.as_deref(), Some("/file/"));
        assert_eq!(options.exclude.as_deref(), Some("query"));
        assert_eq!(options.known_helpers, Some(StringList::Many(vec!["t".to_string()])));
    }

    #[test]
    fn test_empty_flags_leave_options_unset() {
        let options = CompileCommand::default().flag_options();
        assert_eq!(options, LoaderOptions::default());
    }

    #[test]
    fn test_repeatable_flags_become_lists() {
        let cmd = CompileCommand {
            helper_dirs: vec!["/a".to_string(), "/b".to_string()],
            debug: true,
            ..Default::default()
        };
        let options = cmd.flag_options();
        assert_eq!(options.helper_dirs, Some(StringList::Many(vec!["/a".to_string(), "/b".to_string()])));
        assert_eq!(options.debug, Some(true));
    }

    #[tokio::test]
    async fn test_multiple_templates_need_out_dir() {
        let cmd = CompileCommand {
            templates: vec![PathBuf::from("a.hbs"), PathBuf::from("b.hbs")],
            ..Default::default()
        };
        let err = cmd.execute(&CliConfig::new()).await.unwrap_err();
        assert!(err.to_string().contains("--out-dir"));
    }
}
