//! In-memory module graph.
//!
//! Nodes are kept in a hash map keyed by `ModuleId`, with forward and
//! reverse edge indexes maintained together on every mutation. Reverse
//! edges make ancestor invalidation proportional to the affected subgraph
//! instead of the whole graph.
//!
//! The interior sits behind a single `parking_lot::RwLock`; every mutation
//! happens under one write-lock acquisition so concurrent readers observe
//! either the pre- or post-mutation graph, never a torn state. No I/O or
//! awaiting ever happens while the lock is held.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::module::Module;
use crate::module_id::ModuleId;

#[derive(Default)]
struct GraphInner {
    modules: FxHashMap<ModuleId, Arc<Module>>,
    /// Forward edges: importer -> imported.
    dependencies: FxHashMap<ModuleId, FxHashSet<ModuleId>>,
    /// Reverse edges: imported -> importers.
    dependents: FxHashMap<ModuleId, FxHashSet<ModuleId>>,
}

/// Directed graph of modules connected by import edges, rooted at the
/// browser entrypoint.
pub struct ModuleGraph {
    root: PathBuf,
    entrypoint: ModuleId,
    inner: RwLock<GraphInner>,
}

impl ModuleGraph {
    pub fn new(root: impl Into<PathBuf>, entrypoint: ModuleId) -> Self {
        Self {
            root: root.into(),
            entrypoint,
            inner: RwLock::new(GraphInner::default()),
        }
    }

    /// Project root all servable paths are expressed against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entrypoint(&self) -> &ModuleId {
        &self.entrypoint
    }

    /// Insert or replace a module node.
    ///
    /// Edges derived from the node's resolved imports are (re)recorded in
    /// the same lock acquisition, so readers never see a node whose edges
    /// are missing or stale.
    pub fn insert(&self, module: Module) {
        let id = module.id.clone();
        let new_targets: FxHashSet<ModuleId> = module.resolved_imports().cloned().collect();

        let mut inner = self.inner.write();

        // Drop edges the previous version of this node contributed.
        if let Some(old_targets) = inner.dependencies.remove(&id) {
            for target in old_targets {
                let now_empty = match inner.dependents.get_mut(&target) {
                    Some(back) => {
                        back.remove(&id);
                        back.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    inner.dependents.remove(&target);
                }
            }
        }

        for target in &new_targets {
            inner
                .dependents
                .entry(target.clone())
                .or_default()
                .insert(id.clone());
        }
        if !new_targets.is_empty() {
            inner.dependencies.insert(id.clone(), new_targets);
        }
        inner.modules.insert(id, Arc::new(module));
    }

    pub fn module(&self, id: &ModuleId) -> Option<Arc<Module>> {
        self.inner.read().modules.get(id).cloned()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.inner.read().modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().modules.is_empty()
    }

    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.inner.read().modules.keys().cloned().collect()
    }

    /// Direct forward edges of `id`.
    pub fn dependencies_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .dependencies
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct reverse edges of `id`.
    pub fn dependents_of(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .dependents
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every module reachable from `id` via reverse edges. Cycle-safe.
    ///
    /// This is exactly the set whose compiled output can embed `id`'s
    /// content, so it is what invalidation evicts.
    pub fn ancestors_of(&self, id: &ModuleId) -> FxHashSet<ModuleId> {
        let inner = self.inner.read();
        let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
        let mut stack: Vec<ModuleId> = inner
            .dependents
            .get(id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = inner.dependents.get(&current) {
                stack.extend(parents.iter().cloned());
            }
        }
        seen
    }
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ModuleGraph")
            .field("root", &self.root)
            .field("entrypoint", &self.entrypoint)
            .field("modules", &inner.modules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{Import, ImportKind};
    use crate::module::SourceType;
    use crate::span::SourceSpan;

    fn id(path: &str) -> ModuleId {
        ModuleId::from_path(path).unwrap()
    }

    fn node(path: &str, imports: &[&str]) -> Module {
        let imports = imports
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let mut imp = Import::new(
                    target.to_string(),
                    ImportKind::Static,
                    SourceSpan::new(i as u32, i as u32 + 1),
                );
                imp.resolved_to = Some(id(target));
                imp
            })
            .collect();
        Module::builder(id(path), path.into(), SourceType::JavaScript)
            .imports(imports)
            .build()
    }

    fn graph() -> ModuleGraph {
        ModuleGraph::new("/app", id("/app/main.js"))
    }

    #[test]
    fn insert_records_forward_and_reverse_edges() {
        let g = graph();
        g.insert(node("/app/main.js", &["/app/util.js"]));
        g.insert(node("/app/util.js", &[]));

        assert_eq!(g.dependencies_of(&id("/app/main.js")), vec![id("/app/util.js")]);
        assert_eq!(g.dependents_of(&id("/app/util.js")), vec![id("/app/main.js")]);
    }

    #[test]
    fn reinsert_replaces_stale_edges() {
        let g = graph();
        g.insert(node("/app/main.js", &["/app/a.js"]));
        g.insert(node("/app/main.js", &["/app/b.js"]));

        assert_eq!(g.dependencies_of(&id("/app/main.js")), vec![id("/app/b.js")]);
        assert!(g.dependents_of(&id("/app/a.js")).is_empty());
        assert_eq!(g.dependents_of(&id("/app/b.js")), vec![id("/app/main.js")]);
    }

    #[test]
    fn ancestors_follow_reverse_edges_transitively() {
        let g = graph();
        g.insert(node("/app/main.js", &["/app/mid.js", "/app/other.js"]));
        g.insert(node("/app/mid.js", &["/app/leaf.js"]));
        g.insert(node("/app/leaf.js", &[]));
        g.insert(node("/app/other.js", &[]));

        let ancestors = g.ancestors_of(&id("/app/leaf.js"));
        assert!(ancestors.contains(&id("/app/mid.js")));
        assert!(ancestors.contains(&id("/app/main.js")));
        assert!(!ancestors.contains(&id("/app/other.js")));
    }

    #[test]
    fn ancestors_terminate_on_cycles() {
        let g = graph();
        g.insert(node("/app/a.js", &["/app/b.js"]));
        g.insert(node("/app/b.js", &["/app/a.js"]));

        let ancestors = g.ancestors_of(&id("/app/a.js"));
        assert!(ancestors.contains(&id("/app/a.js")));
        assert!(ancestors.contains(&id("/app/b.js")));
    }
}
