//! Module resolution.
//!
//! Maps an import specifier plus the importing module onto a canonical
//! `ModuleId`. The import map is consulted first (longest prefix wins),
//! then the specifier is resolved against the importer's directory, probing
//! source extensions and index files the way bundler resolvers do.
//!
//! Resolution is a pure function of its inputs plus filesystem existence;
//! it never mutates anything.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::import_map::ImportMap;
use crate::module_id::{is_remote_specifier, ModuleId, ModuleIdError};

/// Extensions probed, in priority order, when a specifier has no usable one.
const PROBE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "json"];

/// Index files probed when a specifier names a directory.
const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
];

/// Error produced when a specifier cannot be mapped to an existing module.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot resolve '{specifier}' imported from {importer}: no matching file")]
    NotFound { specifier: String, importer: String },

    #[error(
        "bare specifier '{specifier}' imported from {importer} has no import map entry"
    )]
    UnmappedBareSpecifier { specifier: String, importer: String },

    #[error("cannot resolve relative specifier '{specifier}' from remote module {importer}")]
    RelativeFromRemote { specifier: String, importer: String },

    #[error("invalid module identifier for '{specifier}': {message}")]
    InvalidId { specifier: String, message: String },
}

impl ResolveError {
    fn invalid(specifier: &str, err: ModuleIdError) -> Self {
        Self::InvalidId {
            specifier: specifier.to_string(),
            message: err.to_string(),
        }
    }
}

/// Resolves import specifiers to canonical module ids.
#[derive(Debug, Clone)]
pub struct Resolver {
    /// Project root; `/`-prefixed specifiers and unmatched bare fallbacks
    /// resolve under it.
    root: PathBuf,
    import_map: ImportMap,
}

impl Resolver {
    pub fn new(root: impl Into<PathBuf>, import_map: ImportMap) -> Self {
        Self {
            root: root.into().clean(),
            import_map,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn import_map(&self) -> &ImportMap {
        &self.import_map
    }

    /// Resolve `specifier` as imported from `importer`.
    pub fn resolve(&self, specifier: &str, importer: &ModuleId) -> Result<ModuleId, ResolveError> {
        // Import map first, so aliases can redirect anything, including
        // relative-looking specifiers.
        let target = match self.import_map.rewrite(specifier) {
            Some(rewritten) => rewritten,
            None => specifier.to_string(),
        };

        if is_remote_specifier(&target) {
            return ModuleId::from_url(&target).map_err(|e| ResolveError::invalid(specifier, e));
        }

        if target.starts_with('/') {
            return self.probe(
                self.root.join(target.trim_start_matches('/')),
                specifier,
                importer.as_str(),
            );
        }

        if target.starts_with("./") || target.starts_with("../") {
            let Some(importer_path) = importer.to_path() else {
                return Err(ResolveError::RelativeFromRemote {
                    specifier: specifier.to_string(),
                    importer: importer.to_string(),
                });
            };
            let base = importer_path.parent().unwrap_or(Path::new("/"));
            return self.probe(base.join(&target), specifier, importer.as_str());
        }

        // A bare specifier that survived the import map has nowhere to go.
        Err(ResolveError::UnmappedBareSpecifier {
            specifier: specifier.to_string(),
            importer: importer.to_string(),
        })
    }

    /// Resolve a request-path suffix (the part after the compiler prefix)
    /// to a module id.
    ///
    /// The suffix is normally relative to the project root; modules that
    /// live outside the root are encoded by their full absolute path, so
    /// that interpretation is probed second.
    pub fn resolve_request_path(&self, request_path: &str) -> Result<ModuleId, ResolveError> {
        let rel = request_path.trim_start_matches('/');
        match self.probe(self.root.join(rel), request_path, "request") {
            Ok(id) => Ok(id),
            Err(err) => {
                let absolute = PathBuf::from(format!("/{rel}"));
                if absolute == self.root.join(rel) {
                    return Err(err);
                }
                self.probe(absolute, request_path, "request").or(Err(err))
            }
        }
    }

    /// Deterministic id for a specifier that failed to resolve, so the
    /// graph can hold an errored node at a stable address.
    pub fn fallback_id(&self, specifier: &str, importer: &ModuleId) -> ModuleId {
        let target = self
            .import_map
            .rewrite(specifier)
            .unwrap_or_else(|| specifier.to_string());
        let candidate = if target.starts_with('/') {
            self.root.join(target.trim_start_matches('/'))
        } else if target.starts_with("./") || target.starts_with("../") {
            match importer.to_path().and_then(|p| p.parent().map(Path::to_path_buf)) {
                Some(base) => base.join(&target),
                None => self.root.join(target.trim_start_matches("./")),
            }
        } else {
            self.root.join(&target)
        };
        // Only a relative or non-UTF-8 root can make this fail; address
        // the broken edge at the importer itself rather than panic.
        ModuleId::from_path(candidate.clean()).unwrap_or_else(|_| importer.clone())
    }

    /// Probe a candidate path: exact file, appended extensions, then index
    /// files for directories.
    fn probe(
        &self,
        candidate: PathBuf,
        specifier: &str,
        importer: &str,
    ) -> Result<ModuleId, ResolveError> {
        let candidate = candidate.clean();

        if candidate.is_file() {
            return ModuleId::from_path(&candidate).map_err(|e| ResolveError::invalid(specifier, e));
        }

        if !candidate.is_dir() {
            if let Some(base) = candidate.to_str() {
                for ext in PROBE_EXTENSIONS {
                    let probe = PathBuf::from(format!("{base}.{ext}"));
                    if probe.is_file() {
                        return ModuleId::from_path(&probe)
                            .map_err(|e| ResolveError::invalid(specifier, e));
                    }
                }
            }
        }

        if candidate.is_dir() {
            for index in INDEX_FILES {
                let probe = candidate.join(index);
                if probe.is_file() {
                    return ModuleId::from_path(&probe)
                        .map_err(|e| ResolveError::invalid(specifier, e));
                }
            }
        }

        Err(ResolveError::NotFound {
            specifier: specifier.to_string(),
            importer: importer.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join("main.js"), "export {}\n").unwrap();
        fs::write(root.join("util.ts"), "export {}\n").unwrap();
        fs::create_dir(root.join("widgets")).unwrap();
        fs::write(root.join("widgets/index.js"), "export {}\n").unwrap();
        let map = ImportMap::from_entries([
            ("react".to_string(), "https://esm.sh/react@18".to_string()),
            ("~/".to_string(), "/".to_string()),
        ]);
        let resolver = Resolver::new(root, map);
        (dir, resolver)
    }

    fn importer(resolver: &Resolver) -> ModuleId {
        ModuleId::from_path(resolver.root().join("main.js")).unwrap()
    }

    #[test]
    fn relative_specifiers_resolve_against_importer() {
        let (_dir, resolver) = fixture();
        let id = resolver.resolve("./util.ts", &importer(&resolver)).unwrap();
        assert!(id.as_str().ends_with("util.ts"));
    }

    #[test]
    fn extensionless_specifiers_probe_extensions() {
        let (_dir, resolver) = fixture();
        let id = resolver.resolve("./util", &importer(&resolver)).unwrap();
        assert!(id.as_str().ends_with("util.ts"));
    }

    #[test]
    fn directories_resolve_to_index_files() {
        let (_dir, resolver) = fixture();
        let id = resolver.resolve("./widgets", &importer(&resolver)).unwrap();
        assert!(id.as_str().ends_with("widgets/index.js"));
    }

    #[test]
    fn import_map_redirects_bare_specifiers_to_remote() {
        let (_dir, resolver) = fixture();
        let id = resolver.resolve("react", &importer(&resolver)).unwrap();
        assert!(id.is_remote());
    }

    #[test]
    fn import_map_prefixes_land_under_the_root() {
        let (_dir, resolver) = fixture();
        let id = resolver.resolve("~/util.ts", &importer(&resolver)).unwrap();
        assert!(id.as_str().ends_with("util.ts"));
    }

    #[test]
    fn same_file_through_different_specifiers_dedups() {
        let (_dir, resolver) = fixture();
        let imp = importer(&resolver);
        let a = resolver.resolve("./util", &imp).unwrap();
        let b = resolver.resolve("~/util.ts", &imp).unwrap();
        let c = resolver.resolve("./widgets/../util.ts", &imp).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn missing_files_are_resolution_errors() {
        let (_dir, resolver) = fixture();
        let err = resolver
            .resolve("./missing.js", &importer(&resolver))
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn unmapped_bare_specifiers_are_errors() {
        let (_dir, resolver) = fixture();
        let err = resolver.resolve("lodash", &importer(&resolver)).unwrap_err();
        assert!(matches!(err, ResolveError::UnmappedBareSpecifier { .. }));
    }

    #[test]
    fn fallback_ids_are_stable() {
        let (_dir, resolver) = fixture();
        let imp = importer(&resolver);
        let a = resolver.fallback_id("./missing.js", &imp);
        let b = resolver.fallback_id("./widgets/../missing.js", &imp);
        assert_eq!(a, b);
    }

    #[test]
    fn fallback_id_with_relative_root_degrades_to_importer() {
        let resolver = Resolver::new("app", ImportMap::empty());
        let imp = ModuleId::from_path("/elsewhere/main.js").unwrap();
        assert_eq!(resolver.fallback_id("/missing.js", &imp), imp);
    }

    #[test]
    fn request_paths_outside_the_root_decode_to_absolute_ids() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("shared.js"), "export {}\n").unwrap();

        let resolver = Resolver::new(&root, ImportMap::empty());
        let request = dir
            .path()
            .join("shared.js")
            .to_str()
            .unwrap()
            .trim_start_matches('/')
            .to_string();

        let id = resolver.resolve_request_path(&request).unwrap();
        assert_eq!(id, ModuleId::from_path(dir.path().join("shared.js")).unwrap());
    }
}
