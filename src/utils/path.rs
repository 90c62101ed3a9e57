//! Lexical path helpers.
//!
//! None of these functions touch the file system, so they work for paths that
//! do not exist yet (resolution candidates, cache entries).

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without consulting the file system.
///
/// # Examples
///
/// ```rust
/// use hbs_loader::utils::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(normalize_path(Path::new("/src/./tpl/../partials")), PathBuf::from("/src/partials"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Render a path with forward slashes, dropping Windows extended-length prefixes.
///
/// Generated module code and cache keys always use this form so output does
/// not depend on the host platform.
#[must_use]
pub fn normalize_path_for_storage<P: AsRef<Path>>(path: P) -> String {
    let path_str = path.as_ref().to_string_lossy();

    let cleaned = if let Some(stripped) = path_str.strip_prefix(r"\\?\UNC\") {
        format!("//{stripped}")
    } else if let Some(stripped) = path_str.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        path_str.to_string()
    };

    cleaned.replace('\\', "/")
}
