//! Web import maps.
//!
//! Loaded once at server startup from a JSON file in the standard
//! `{ "imports": { specifier-prefix: target-prefix } }` shape and immutable
//! afterwards. Matching is longest-prefix-first so `react/` can shadow a
//! broader `react` entry regardless of file order.

use std::path::Path;

use serde::Deserialize;

/// Error produced while loading an import map file.
#[derive(Debug, thiserror::Error)]
pub enum ImportMapError {
    #[error("failed to read import map {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid import map {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawImportMap {
    #[serde(default)]
    imports: serde_json::Map<String, serde_json::Value>,
}

/// Ordered specifier-prefix to target-prefix mapping.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    /// Entries sorted by descending prefix length so the first match wins.
    entries: Vec<(String, String)>,
}

impl ImportMap {
    /// An empty map; every specifier falls through to relative resolution.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: Vec<(String, String)> = entries.into_iter().collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    /// Load an import map from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ImportMapError> {
        let text = std::fs::read_to_string(path).map_err(|source| ImportMapError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawImportMap =
            serde_json::from_str(&text).map_err(|source| ImportMapError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let entries = raw
            .imports
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|t| (k, t.to_string())))
            .collect::<Vec<_>>();
        Ok(Self::from_entries(entries))
    }

    /// Rewrite `specifier` through the longest matching prefix entry.
    ///
    /// Exact-key entries (`"react" -> "https://esm.sh/react"`) replace the
    /// whole specifier; prefix entries keep the unmatched tail.
    pub fn rewrite(&self, specifier: &str) -> Option<String> {
        for (prefix, target) in &self.entries {
            if specifier == prefix {
                return Some(target.clone());
            }
            // Prefix entries only make sense at a path boundary.
            if prefix.ends_with('/') && specifier.starts_with(prefix.as_str()) {
                return Some(format!("{target}{}", &specifier[prefix.len()..]));
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
