//! # Key Resolution
//!
//! Maps slash-delimited storage keys onto the configured root directory and
//! back. Keys that could escape the root are rejected before any join.

use std::path::{Component, Path, PathBuf};

use super::errors::{StorageError, StorageResult};

/// Check that a key is a relative, traversal-free, slash-delimited path
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidPath("empty key".into()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidPath(format!("absolute key: {}", key)));
    }
    if key.contains('\\') || key.contains('\0') {
        return Err(StorageError::InvalidPath(format!("illegal character in key: {}", key)));
    }

    for segment in segments(key) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(StorageError::InvalidPath(format!(
                    "illegal segment '{}' in key: {}",
                    segment, key
                )))
            }
        }
    }

    if segments(key).next().is_none() {
        return Err(StorageError::InvalidPath(format!("key names the storage root: {}", key)));
    }

    Ok(())
}

/// Non-empty segments of a key, with `.` dropped
fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Resolves storage keys against a fixed root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical path for a key
    pub fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let mut path = self.root.clone();
        for segment in segments(key) {
            path.push(segment);
        }
        Ok(path)
    }

    /// Physical path for a listing prefix; an empty prefix is the root itself
    pub fn resolve_prefix(&self, prefix: &str) -> StorageResult<PathBuf> {
        if prefix.is_empty() {
            return Ok(self.root.clone());
        }
        self.resolve(prefix)
    }

    /// Logical key for a physical path under the root, always slash-separated
    pub fn to_logical(&self, path: &Path) -> StorageResult<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            StorageError::InvalidPath(format!("{} is outside the storage root", path.display()))
        })?;

        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        Ok(parts.join("/"))
    }
}
