//! Module nodes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::import::Import;
use crate::module_id::ModuleId;

/// Content fingerprint of a module's source text.
pub type SourceHash = [u8; 32];

/// Hash source bytes with BLAKE3. Used for cache keys and change detection.
pub fn fingerprint(source: &[u8]) -> SourceHash {
    *blake3::hash(source).as_bytes()
}

/// One node in the module graph.
///
/// Nodes are owned by the graph and handed out as `Arc<Module>`; the import
/// list is additionally `Arc`-wrapped so cloning a node for a compile pass
/// stays cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    /// Local path for filesystem modules; the id itself for remote ones.
    pub path: PathBuf,
    pub source_type: SourceType,
    pub source_hash: SourceHash,
    /// Import edges in source order.
    pub imports: Arc<Vec<Import>>,
    pub is_entry: bool,
    /// Remote modules are leaf nodes: recorded, never read or compiled.
    pub is_remote: bool,
    /// Set when the module failed to resolve or parse. The node stays in
    /// the graph so a request for it yields a deterministic diagnostic.
    pub error: Option<String>,
}

impl Module {
    pub fn builder(id: ModuleId, path: PathBuf, source_type: SourceType) -> ModuleBuilder {
        ModuleBuilder {
            module: Self {
                id,
                path,
                source_type,
                source_hash: [0; 32],
                imports: Arc::new(Vec::new()),
                is_entry: false,
                is_remote: false,
                error: None,
            },
        }
    }

    /// Build an errored placeholder node for an id that could not be
    /// resolved or parsed.
    pub fn errored(id: ModuleId, message: impl Into<String>) -> Self {
        let path = id.to_path().unwrap_or_else(|| PathBuf::from(id.as_str()));
        let source_type = SourceType::from_path(&path);
        Self {
            id,
            path,
            source_type,
            source_hash: [0; 32],
            imports: Arc::new(Vec::new()),
            is_entry: false,
            is_remote: false,
            error: Some(message.into()),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    /// Ordered resolved targets of this module's import edges.
    pub fn resolved_imports(&self) -> impl Iterator<Item = &ModuleId> {
        self.imports.iter().filter_map(|imp| imp.resolved_to.as_ref())
    }
}

/// Builder for `Module` to avoid long constructor argument lists.
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn imports(mut self, imports: Vec<Import>) -> Self {
        self.module.imports = Arc::new(imports);
        self
    }

    pub fn source_hash(mut self, hash: SourceHash) -> Self {
        self.module.source_hash = hash;
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.module.is_entry = is_entry;
        self
    }

    pub fn remote(mut self, is_remote: bool) -> Self {
        self.module.is_remote = is_remote;
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.module.error = error;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// Resolved module source type derived from file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Json,
    Unknown,
}

impl SourceType {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "jsx" => Self::Jsx,
            "tsx" => Self::Tsx,
            "json" => Self::Json,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// True for source types the transpiler can handle.
    pub fn is_javascript_like(&self) -> bool {
        matches!(
            self,
            Self::JavaScript | Self::TypeScript | Self::Jsx | Self::Tsx
        )
    }

    /// True when the source needs lowering (type stripping or JSX) before a
    /// browser can execute it.
    pub fn needs_lowering(&self) -> bool {
        matches!(self, Self::TypeScript | Self::Jsx | Self::Tsx)
    }
}
