//! The `cache` subcommand: inspect and empty a module cache directory.

use super::CliConfig;
use crate::cache::TemplateCache;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommands,
}

#[derive(Subcommand)]
enum CacheSubcommands {
    /// Remove every cached module from a cache directory
    Clean {
        /// Cache directory (the loader's `cache` option)
        dir: PathBuf,
    },

    /// Show the number and size of cached modules
    Info {
        /// Cache directory (the loader's `cache` option)
        dir: PathBuf,
    },
}

impl CacheCommand {
    pub fn execute(self, config: &CliConfig) -> Result<()> {
        match self.command {
            CacheSubcommands::Clean {
                dir,
            } => {
                let removed = TemplateCache::new(&dir).clean()?;
                tracing::info!("Removed {} cache entries from {}", removed, dir.display());
                if !config.quiet {
                    println!("{} Removed {} cached module(s) from {}", "✓".green(), removed, dir.display());
                }
            }
            CacheSubcommands::Info {
                dir,
            } => {
                let stats = TemplateCache::new(&dir).stats();
                println!("{}", "Cache:".bold());
                println!("  {} {}", "Directory:".cyan(), dir.display());
                println!("  {} {}", "Entries:".cyan(), stats.entries);
                println!("  {} {}", "Size:".cyan(), format_size(stats.total_bytes));
            }
        }
        Ok(())
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
