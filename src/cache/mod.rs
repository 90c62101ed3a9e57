//! On-disk cache of emitted modules.
//!
//! Each template maps to one entry file named after the SHA-256 of its path:
//!
//! ```text
//! <cache>/
//! ├── 3f0a…c9.hbs.compiled   # module emitted for /src/views/page.hbs
//! └── 81be…02.hbs.compiled
//! ```
//!
//! An entry is served only while it is strictly newer than the template
//! source. Editing the template makes its entry stale; the next compile
//! overwrites it. Entries are written atomically so a concurrent reader never
//! sees a truncated module.

use crate::constants::CACHE_FILE_SUFFIX;
use crate::core::LoaderError;
use crate::utils::{atomic_write, ensure_dir, normalize_path_for_storage};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Entry counts and sizes of a cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct TemplateCache {
    dir: PathBuf,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry file for the template at `resource_path`.
    #[must_use]
    pub fn entry_path(&self, resource_path: &Path) -> PathBuf {
        let key = hex::encode(Sha256::digest(normalize_path_for_storage(resource_path).as_bytes()));
        self.dir.join(format!("{key}{CACHE_FILE_SUFFIX}"))
    }

    /// The cached module for `resource_path`, if one exists and is newer than
    /// the source. Returns `None` when the source cannot be inspected.
    pub fn lookup(&self, resource_path: &Path) -> Result<Option<String>, LoaderError> {
        let Ok(source_modified) = fs::metadata(resource_path).and_then(|m| m.modified()) else {
            return Ok(None);
        };

        let entry = self.entry_path(resource_path);
        let entry_modified = match fs::metadata(&entry).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_error(&entry, &e)),
        };

        if entry_modified <= source_modified {
            tracing::debug!("Stale cache entry {} for {}", entry.display(), resource_path.display());
            return Ok(None);
        }

        fs::read_to_string(&entry).map(Some).map_err(|e| cache_error(&entry, &e))
    }

    /// Persist `module` as the entry for `resource_path`.
    pub fn store(&self, resource_path: &Path, module: &str) -> Result<PathBuf, LoaderError> {
        let entry = self.entry_path(resource_path);
        ensure_dir(&self.dir)
            .and_then(|()| atomic_write(&entry, module.as_bytes()))
            .map_err(|e| LoaderError::CacheError {
                path: entry.display().to_string(),
                reason: format!("{e:#}"),
            })?;
        Ok(entry)
    }

    /// Remove every entry. Other files in the directory are left alone.
    pub fn clean(&self) -> Result<usize, LoaderError> {
        let mut removed = 0;
        for entry in self.entries() {
            fs::remove_file(&entry).map_err(|e| cache_error(&entry, &e))?;
            removed += 1;
        }
        Ok(removed)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.entries().iter().fold(CacheStats::default(), |mut stats, entry| {
            stats.entries += 1;
            stats.total_bytes += fs::metadata(entry).map(|m| m.len()).unwrap_or(0);
            stats
        })
    }

    fn entries(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().ends_with(CACHE_FILE_SUFFIX))
            .map(walkdir::DirEntry::into_path)
            .collect()
    }
}

fn cache_error(path: &Path, error: &std::io::Error) -> LoaderError {
    LoaderError::CacheError {
        path: path.display().to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn age(path: &Path, seconds: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(seconds)).unwrap();
    }

    #[test]
    fn test_entry_path_is_stable() {
        let cache = TemplateCache::new("/cache");
        let a = cache.entry_path(Path::new("/src/a.hbs"));
        assert_eq!(a, cache.entry_path(Path::new("/src/a.hbs")));
        assert_ne!(a, cache.entry_path(Path::new("/src/b.hbs")));
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".hbs.compiled"));
        assert_eq!(name.len(), 64 + ".hbs.compiled".len());
    }

    #[test]
    fn test_hit_requires_newer_entry() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("page.hbs");
        fs::write(&source, "<p></p>").unwrap();
        age(&source, 60);

        let cache = TemplateCache::new(temp.path().join("cache"));
        assert_eq!(cache.lookup(&source).unwrap(), None);

        let entry = cache.store(&source, "module.exports = 1;").unwrap();
        assert_eq!(cache.lookup(&source).unwrap().as_deref(), Some("module.exports = 1;"));

        // Entry older than the source is stale
        age(&entry, 120);
        assert_eq!(cache.lookup(&source).unwrap(), None);
    }

    #[test]
    fn test_missing_source_skips_cache() {
        let temp = TempDir::new().unwrap();
        let cache = TemplateCache::new(temp.path());
        let source = temp.path().join("gone.hbs");
        cache.store(&source, "x").unwrap();
        assert_eq!(cache.lookup(&source).unwrap(), None);
    }

    #[test]
    fn test_clean_and_stats() {
        let temp = TempDir::new().unwrap();
        let cache = TemplateCache::new(temp.path());
        cache.store(Path::new("/a.hbs"), "12345").unwrap();
        cache.store(Path::new("/b.hbs"), "123").unwrap();
        fs::write(temp.path().join("keep.txt"), "keep").unwrap();

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 2,
                total_bytes: 8,
            }
        );
        assert_eq!(cache.clean().unwrap(), 2);
        assert_eq!(cache.stats().entries, 0);
        assert!(temp.path().join("keep.txt").exists());
    }

    #[test]
    fn test_stats_of_missing_dir() {
        let cache = TemplateCache::new("/definitely/not/here");
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
