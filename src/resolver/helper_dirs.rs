//! Bulk registration of helper modules.

use crate::symbols::BuildCache;
use std::path::PathBuf;

/// Register every `<dir>/*.<extension>` file as a known, already-found helper
/// named after its file stem.
///
/// The scan runs at most once per [`BuildCache`]; later calls return `0`
/// without touching the file system. `glob` is synchronous, so the listing
/// runs on the blocking pool.
pub async fn scan_helper_dirs(dirs: &[PathBuf], extension: &str, cache: &BuildCache) -> usize {
    if dirs.is_empty() || !cache.claim_helper_dir_scan() {
        return 0;
    }

    let dirs = dirs.to_vec();
    let extension = extension.to_string();
    let found = match tokio::task::spawn_blocking(move || list_helper_files(&dirs, &extension)).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("Helper directory scan did not complete: {}", e);
            return 0;
        }
    };

    for (name, path) in &found {
        tracing::debug!("Registered helper '{}' from {}", name, path.display());
        cache.record_helper(name, path.clone());
    }
    found.len()
}

// Blocking: called through spawn_blocking.
fn list_helper_files(dirs: &[PathBuf], extension: &str) -> Vec<(String, PathBuf)> {
    let mut found = Vec::new();
    for dir in dirs {
        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(extension)
        );
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Skipping helper directory {}: {}", dir.display(), e);
                continue;
            }
        };

        for entry in entries {
            let path: PathBuf = match entry {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Unreadable entry in helper directory {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            found.push((name.to_string(), path.clone()));
        }
    }
    found
}
