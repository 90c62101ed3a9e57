//! Fixtures for template projects on disk.

use crate::resolver::{FsModuleResolver, ModuleResolver, ProbeError};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A temporary project directory holding templates, partials and helpers.
///
/// The directory is removed when the fixture is dropped.
pub struct TemplateProject {
    dir: TempDir,
}

impl TemplateProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create temp dir")?,
        })
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn with_file(self, relative: &str, content: &str) -> Result<Self> {
        self.write(relative, content)?;
        Ok(self)
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Absolute path of `relative` as a string, for use in loader options.
    #[must_use]
    pub fn dir_option(&self, relative: &str) -> String {
        self.path(relative).to_string_lossy().into_owned()
    }
}

/// File system resolver that counts and records every probe.
#[derive(Debug, Default)]
pub struct CountingResolver {
    inner: FsModuleResolver,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl CountingResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of probes made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests probed so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ModuleResolver for CountingResolver {
    async fn resolve(&self, base_dir: &Path, request: &str) -> Result<PathBuf, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.to_string());
        }
        self.inner.resolve(base_dir, request).await
    }
}

impl ModuleResolver for &CountingResolver {
    async fn resolve(&self, base_dir: &Path, request: &str) -> Result<PathBuf, ProbeError> {
        (**self).resolve(base_dir, request).await
    }
}
