//! Shared state for the development pipeline.

use std::sync::Arc;

use kiln_compiler::{Compile, CompileCache};
use kiln_graph::{GraphBuilder, ModuleGraph};

/// Everything the compiler middleware needs, cloned per request.
///
/// Only constructed in development mode; the production pipeline holds no
/// graph, cache or transpiler at all.
#[derive(Clone)]
pub struct DevState {
    pub graph: Arc<ModuleGraph>,
    pub builder: Arc<GraphBuilder>,
    pub cache: Arc<CompileCache>,
    pub compiler: Arc<dyn Compile>,
}

impl DevState {
    pub fn new(
        graph: ModuleGraph,
        builder: GraphBuilder,
        cache: CompileCache,
        compiler: Arc<dyn Compile>,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            builder: Arc::new(builder),
            cache: Arc::new(cache),
            compiler,
        }
    }
}
