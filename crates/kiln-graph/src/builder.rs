//! Module graph construction.
//!
//! `GraphBuilder` walks the static import graph from the browser
//! entrypoint with an explicit worklist and a visited set, so cyclic
//! graphs terminate and every module is parsed exactly once per pass.
//! Per-module failures (unreadable file, syntax error, unresolvable
//! specifier) become errored nodes instead of aborting the walk; one broken
//! module never takes down the rest of the application.

use std::path::Path;

use path_clean::PathClean;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::collect::extract_imports;
use crate::graph::ModuleGraph;
use crate::module::{fingerprint, Module, SourceType};
use crate::module_id::{ModuleId, ModuleIdError};
use crate::resolver::Resolver;

/// Hard ceiling on modules processed in one walk. The visited set already
/// guarantees termination on cycles; this guards against a bookkeeping bug
/// ever turning into a hung server.
const MAX_MODULES_PER_WALK: usize = 100_000;

/// Error produced by graph construction itself (per-module problems are
/// recorded on nodes, not raised here).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid entrypoint: {0}")]
    InvalidEntrypoint(#[from] ModuleIdError),

    #[error("graph walk did not converge after visiting {visited} modules")]
    CycleStall { visited: usize },
}

/// Builds and incrementally maintains a [`ModuleGraph`].
pub struct GraphBuilder {
    resolver: Resolver,
}

impl GraphBuilder {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Build the initial graph from the entrypoint file.
    pub async fn build(&self, entrypoint: &Path) -> Result<ModuleGraph, GraphError> {
        let absolute = if entrypoint.is_absolute() {
            entrypoint.to_path_buf().clean()
        } else {
            self.resolver.root().join(entrypoint).clean()
        };
        let entry_id = ModuleId::from_path(&absolute)?;
        let graph = ModuleGraph::new(self.resolver.root().to_path_buf(), entry_id.clone());
        self.walk(&graph, entry_id).await?;
        debug!(modules = graph.len(), "module graph built");
        Ok(graph)
    }

    /// Insert a module first seen at request time (typically a dynamic
    /// import target), walking only its not-yet-known subtree.
    pub async fn extend(&self, graph: &ModuleGraph, id: ModuleId) -> Result<(), GraphError> {
        if graph.contains(&id) {
            return Ok(());
        }
        debug!(module = %id, "extending module graph");
        self.walk(graph, id).await
    }

    /// React to a changed source file.
    ///
    /// Rehashes and re-parses the module; when its content actually
    /// changed, the node is replaced (new imports walked in) and the
    /// changed module plus every reverse-edge ancestor is returned so the
    /// compile cache can evict them. Descendants are untouched: a child's
    /// content does not depend on its parent.
    pub async fn invalidate(
        &self,
        graph: &ModuleGraph,
        id: &ModuleId,
    ) -> Result<Vec<ModuleId>, GraphError> {
        let Some(existing) = graph.module(id) else {
            return Ok(Vec::new());
        };
        if existing.is_remote {
            return Ok(Vec::new());
        }

        let is_entry = existing.is_entry;
        let (module, errored_targets) = self.load_module(id.clone(), is_entry).await;

        let unchanged = module.source_hash == existing.source_hash
            && !module.is_errored()
            && !existing.is_errored();
        if unchanged {
            return Ok(Vec::new());
        }

        for target in errored_targets {
            if !graph.contains(&target.id) {
                graph.insert(target);
            }
        }
        let new_children: Vec<ModuleId> = module
            .imports
            .iter()
            .filter(|imp| imp.kind.is_eager())
            .filter_map(|imp| imp.resolved_to.clone())
            .filter(|target| !target.is_remote() && !graph.contains(target))
            .collect();
        graph.insert(module);
        for child in new_children {
            self.walk(graph, child).await?;
        }

        let mut affected: Vec<ModuleId> = graph.ancestors_of(id).into_iter().collect();
        affected.push(id.clone());
        debug!(module = %id, affected = affected.len(), "invalidated module");
        Ok(affected)
    }

    /// Map a changed filesystem path onto a graph module, if it is one.
    pub fn module_id_for_path(&self, graph: &ModuleGraph, path: &Path) -> Option<ModuleId> {
        let absolute = if path.is_absolute() {
            path.to_path_buf().clean()
        } else {
            self.resolver.root().join(path).clean()
        };
        let id = ModuleId::from_path(&absolute).ok()?;
        graph.contains(&id).then_some(id)
    }

    /// Worklist traversal from `start`, inserting every newly discovered
    /// module into `graph`.
    async fn walk(&self, graph: &ModuleGraph, start: ModuleId) -> Result<(), GraphError> {
        let mut stack = vec![start];
        let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
        let mut processed = 0usize;

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) || graph.contains(&id) {
                continue;
            }
            processed += 1;
            if processed > MAX_MODULES_PER_WALK {
                return Err(GraphError::CycleStall { visited: processed });
            }

            let is_entry = &id == graph.entrypoint();
            let (module, errored_targets) = self.load_module(id, is_entry).await;

            for target in errored_targets {
                if !graph.contains(&target.id) && !visited.contains(&target.id) {
                    graph.insert(target);
                }
            }
            for import in module.imports.iter() {
                let Some(target) = &import.resolved_to else {
                    continue;
                };
                if target.is_remote() {
                    if !graph.contains(target) {
                        graph.insert(remote_leaf(target.clone()));
                    }
                } else if import.kind.is_eager() {
                    stack.push(target.clone());
                }
            }
            graph.insert(module);
        }
        Ok(())
    }

    /// Read, hash, parse and resolve one module. Failures yield an errored
    /// node; resolution failures of individual specifiers additionally
    /// yield errored placeholder nodes at the specifier's would-be id.
    async fn load_module(&self, id: ModuleId, is_entry: bool) -> (Module, Vec<Module>) {
        if id.is_remote() {
            return (remote_leaf(id), Vec::new());
        }
        // Local ids always carry a path.
        let path = id.to_path().unwrap_or_default();
        let source_type = SourceType::from_path(&path);

        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(err) => {
                let module = Module::builder(id, path, source_type)
                    .entry(is_entry)
                    .error(Some(format!("failed to read module: {err}")))
                    .build();
                return (module, Vec::new());
            }
        };
        let source_hash = fingerprint(source.as_bytes());

        // JSON and other non-script sources carry no imports of their own.
        if !source_type.is_javascript_like() {
            let module = Module::builder(id, path, source_type)
                .entry(is_entry)
                .source_hash(source_hash)
                .build();
            return (module, Vec::new());
        }

        let mut imports = match extract_imports(&source, source_type) {
            Ok(imports) => imports,
            Err(err) => {
                let module = Module::builder(id, path, source_type)
                    .entry(is_entry)
                    .source_hash(source_hash)
                    .error(Some(err.to_string()))
                    .build();
                return (module, Vec::new());
            }
        };

        let mut errored_targets = Vec::new();
        for import in &mut imports {
            match self.resolver.resolve(&import.specifier, &id) {
                Ok(target) => import.resolved_to = Some(target),
                Err(err) if import.kind.is_eager() => {
                    // Give the broken edge a stable address so a request
                    // for it gets a resolution diagnostic, not a 404.
                    let target = self.resolver.fallback_id(&import.specifier, &id);
                    errored_targets.push(Module::errored(target.clone(), err.to_string()));
                    import.resolved_to = Some(target);
                }
                Err(_) => {
                    // Dynamic import targets are resolved again at request
                    // time; an unresolvable one is not an error yet.
                }
            }
        }

        let module = Module::builder(id, path, source_type)
            .entry(is_entry)
            .source_hash(source_hash)
            .imports(imports)
            .build();
        (module, errored_targets)
    }
}

fn remote_leaf(id: ModuleId) -> Module {
    let path = std::path::PathBuf::from(id.as_str());
    Module::builder(id, path, SourceType::Unknown)
        .remote(true)
        .build()
}
