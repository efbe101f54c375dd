//! Compile memoization with single-flight semantics.
//!
//! Entries are keyed by module id and validated against the module's
//! current source hash. Concurrent requests for the same uncached module
//! join one in-flight compilation instead of racing: the first requester
//! spawns the compile as a detached task and everyone awaits its result
//! over a watch channel. Because the task is detached, an aborted request
//! cannot poison the cache; the compilation completes and later requesters
//! get the entry.
//!
//! Failed compiles are never stored, so a broken module is re-attempted on
//! every request and heals as soon as its source is fixed.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::debug;

use kiln_graph::{Module, ModuleGraph, ModuleId};

use crate::transpiler::{Compile, CompileError, CompiledModule};

type CompileResult = Result<Arc<CompiledModule>, CompileError>;

enum Slot {
    Ready {
        output: Arc<CompiledModule>,
    },
    Pending {
        rx: watch::Receiver<Option<CompileResult>>,
    },
}

/// Per-process memo of compiled modules. Never persisted.
#[derive(Default)]
pub struct CompileCache {
    slots: Mutex<FxHashMap<ModuleId, Slot>>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return cached output for `module`, compiling at most once per
    /// module id under concurrency.
    ///
    /// A hit requires the entry's hash to match the module's current
    /// source hash; a stale entry is replaced by a fresh compilation.
    pub async fn get_or_compile(
        self: &Arc<Self>,
        module: Arc<Module>,
        graph: Arc<ModuleGraph>,
        compiler: Arc<dyn Compile>,
    ) -> CompileResult {
        let mut rx = {
            let mut slots = self.slots.lock();
            match slots.get(&module.id) {
                Some(Slot::Ready { output }) if output.source_hash == module.source_hash => {
                    return Ok(Arc::clone(output));
                }
                Some(Slot::Pending { rx }) => rx.clone(),
                // Vacant, or a Ready entry for an older source version.
                _ => {
                    let (tx, rx) = watch::channel(None);
                    slots.insert(module.id.clone(), Slot::Pending { rx: rx.clone() });
                    self.spawn_compile(tx, module.clone(), graph, compiler);
                    rx
                }
            }
        };

        loop {
            {
                let value = rx.borrow_and_update();
                if let Some(result) = value.as_ref() {
                    return result.clone();
                }
            }
            if rx.changed().await.is_err() {
                // Compile task dropped its sender without a result.
                return Err(CompileError::TaskFailed {
                    id: module.id.clone(),
                });
            }
        }
    }

    /// Drop cached entries for the given modules. In-flight compilations
    /// are left alone; their output is hash-checked on the next lookup.
    pub fn evict(&self, ids: &[ModuleId]) {
        let mut slots = self.slots.lock();
        for id in ids {
            if matches!(slots.get(id), Some(Slot::Ready { .. })) {
                slots.remove(id);
                debug!(module = %id, "evicted compiled output");
            }
        }
    }

    /// Number of completed entries currently held.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        matches!(self.slots.lock().get(id), Some(Slot::Ready { .. }))
    }

    /// Run the compilation on a detached task so request cancellation
    /// cannot abandon it half-done.
    fn spawn_compile(
        self: &Arc<Self>,
        tx: watch::Sender<Option<CompileResult>>,
        module: Arc<Module>,
        graph: Arc<ModuleGraph>,
        compiler: Arc<dyn Compile>,
    ) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let result = compiler.compile(&module, &graph).await.map(Arc::new);

            {
                let mut slots = cache.slots.lock();
                match &result {
                    Ok(output) => {
                        slots.insert(
                            module.id.clone(),
                            Slot::Ready {
                                output: Arc::clone(output),
                            },
                        );
                    }
                    Err(_) => {
                        // Errored compiles are never cached; clear the
                        // pending marker unless someone already replaced it.
                        if matches!(slots.get(&module.id), Some(Slot::Pending { .. })) {
                            slots.remove(&module.id);
                        }
                    }
                }
            }
            let _ = tx.send(Some(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kiln_graph::SourceType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counting compiler stub with a configurable delay.
    struct StubCompiler {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl StubCompiler {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Compile for StubCompiler {
        async fn compile(
            &self,
            module: &Module,
            _graph: &ModuleGraph,
        ) -> Result<CompiledModule, CompileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(CompileError::Parse {
                    id: module.id.clone(),
                    message: "stub failure".to_string(),
                });
            }
            Ok(CompiledModule {
                id: module.id.clone(),
                source_hash: module.source_hash,
                code: format!("// compiled {}\n", module.id),
                rewrite_deps: Vec::new(),
            })
        }
    }

    fn module(path: &str, hash_seed: u8) -> Arc<Module> {
        let id = ModuleId::from_path(path).unwrap();
        Arc::new(
            Module::builder(id, path.into(), SourceType::JavaScript)
                .source_hash([hash_seed; 32])
                .build(),
        )
    }

    fn graph() -> Arc<ModuleGraph> {
        Arc::new(ModuleGraph::new(
            "/app",
            ModuleId::from_path("/app/main.js").unwrap(),
        ))
    }

    #[tokio::test]
    async fn second_lookup_reuses_the_entry() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::new(Duration::ZERO);
        let (m, g) = (module("/app/main.js", 1), graph());

        let first = cache
            .get_or_compile(m.clone(), g.clone(), compiler.clone())
            .await
            .unwrap();
        let second = cache
            .get_or_compile(m, g, compiler.clone())
            .await
            .unwrap();

        assert_eq!(compiler.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second), "output must be bit-identical");
    }

    #[tokio::test]
    async fn hash_change_triggers_recompilation() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::new(Duration::ZERO);
        let g = graph();

        cache
            .get_or_compile(module("/app/main.js", 1), g.clone(), compiler.clone())
            .await
            .unwrap();
        cache
            .get_or_compile(module("/app/main.js", 2), g, compiler.clone())
            .await
            .unwrap();

        assert_eq!(compiler.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_compilation() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::new(Duration::from_millis(50));
        let (m, g) = (module("/app/main.js", 1), graph());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let (cache, m, g, c) = (cache.clone(), m.clone(), g.clone(), compiler.clone());
            handles.push(tokio::spawn(async move {
                cache.get_or_compile(m, g, c).await.unwrap()
            }));
        }

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.await.unwrap());
        }

        assert_eq!(compiler.calls(), 1);
        assert!(outputs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn failed_compiles_are_not_cached() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::failing();
        let (m, g) = (module("/app/broken.js", 1), graph());

        assert!(cache
            .get_or_compile(m.clone(), g.clone(), compiler.clone())
            .await
            .is_err());
        assert!(!cache.contains(&m.id));

        // Every request re-attempts, so the error can clear once fixed.
        assert!(cache.get_or_compile(m, g, compiler.clone()).await.is_err());
        assert_eq!(compiler.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn aborted_request_does_not_poison_the_cache() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::new(Duration::from_millis(50));
        let (m, g) = (module("/app/main.js", 1), graph());

        let request = {
            let (cache, m, g, c) = (cache.clone(), m.clone(), g.clone(), compiler.clone());
            tokio::spawn(async move { cache.get_or_compile(m, g, c).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        request.abort();

        // The detached compile still completes and populates the cache.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.contains(&m.id));

        let out = cache.get_or_compile(m, g, compiler.clone()).await.unwrap();
        assert_eq!(compiler.calls(), 1);
        assert!(out.code.contains("compiled"));
    }

    #[tokio::test]
    async fn evict_drops_only_the_named_entries() {
        let cache = Arc::new(CompileCache::new());
        let compiler = StubCompiler::new(Duration::ZERO);
        let g = graph();
        let a = module("/app/a.js", 1);
        let b = module("/app/b.js", 1);

        cache
            .get_or_compile(a.clone(), g.clone(), compiler.clone())
            .await
            .unwrap();
        cache
            .get_or_compile(b.clone(), g.clone(), compiler.clone())
            .await
            .unwrap();

        cache.evict(std::slice::from_ref(&a.id));
        assert!(!cache.contains(&a.id));
        assert!(cache.contains(&b.id));
    }
}
