//! Canonical module identifiers.
//!
//! A `ModuleId` names exactly one source module: either an absolute,
//! normalized filesystem path or a remote URL. Two import specifiers that
//! refer to the same underlying file always produce an identical id, which
//! is what makes graph deduplication and cache keying sound.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

/// Error produced when a module identifier cannot be constructed.
#[derive(Debug, thiserror::Error)]
pub enum ModuleIdError {
    #[error("module path is not absolute: {0}")]
    NotAbsolute(PathBuf),

    #[error("module path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    #[error("malformed remote module URL: {0}")]
    MalformedUrl(String),
}

/// Canonical identifier for one source module.
///
/// Stored as an `Arc<str>` so ids clone cheaply; they are used as keys in
/// every graph index and travel through the compile cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// Build an id from a local filesystem path.
    ///
    /// The path must be absolute; it is normalized (`.` and `..` components
    /// removed) so that differently spelled specifiers for the same file
    /// collapse to one id.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModuleIdError> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(ModuleIdError::NotAbsolute(path.to_path_buf()));
        }
        let clean = path.to_path_buf().clean();
        let s = clean
            .to_str()
            .ok_or_else(|| ModuleIdError::NonUtf8(clean.clone()))?;
        Ok(Self(Arc::from(s)))
    }

    /// Build an id for a remote module.
    ///
    /// Only well-formed `http://` / `https://` URLs are accepted; remote
    /// modules are recorded in the graph but never read from disk.
    pub fn from_url(url: &str) -> Result<Self, ModuleIdError> {
        if !is_remote_specifier(url) {
            return Err(ModuleIdError::MalformedUrl(url.to_string()));
        }
        // Minimal shape check: scheme plus a non-empty host segment.
        let rest = url.split_once("://").map(|(_, r)| r).unwrap_or("");
        if rest.is_empty() || rest.starts_with('/') {
            return Err(ModuleIdError::MalformedUrl(url.to_string()));
        }
        Ok(Self(Arc::from(url)))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id names a remote URL rather than a local file.
    pub fn is_remote(&self) -> bool {
        is_remote_specifier(&self.0)
    }

    /// The local filesystem path for this id, if it is not remote.
    pub fn to_path(&self) -> Option<PathBuf> {
        if self.is_remote() {
            None
        } else {
            Some(PathBuf::from(self.0.as_ref()))
        }
    }
}

/// True when a specifier targets a remote module.
pub fn is_remote_specifier(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://")
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ModuleId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self(Arc::from(s.as_str())))
    }
}
