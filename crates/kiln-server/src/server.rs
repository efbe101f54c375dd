//! Server construction and the mode selector.
//!
//! [`create_server`] validates options once, then wires up exactly one of
//! two disjoint pipelines. Development builds the module graph, compiler
//! middleware and watcher; production serves prebuilt assets from disk and
//! constructs none of the development machinery.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use kiln_compiler::{CompileCache, Transpiler};
use kiln_graph::{GraphBuilder, GraphError, ImportMap, ImportMapError, Resolver};

use crate::constants::{KILN_COMPILER_PATH, KILN_STATIC_PATH, VENDOR_PATH};
use crate::middleware::serve_compiled_module;
use crate::options::{assert_server_options, Mode, OptionsError, ServerOptions};
use crate::state::DevState;
use crate::watcher::{spawn_invalidation_task, FileWatcher};

/// Error produced while constructing or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    ImportMap(#[from] ImportMapError),

    #[error("failed to build the module graph: {0}")]
    Graph(#[from] GraphError),

    #[error("failed to watch the project root: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server terminated: {0}")]
    Serve(std::io::Error),
}

/// A fully wired server, ready to bind.
///
/// Holds the file watcher and invalidation task so they live as long as
/// the server does.
pub struct KilnServer {
    mode: Mode,
    router: Router,
    _watcher: Option<FileWatcher>,
    _invalidation: Option<JoinHandle<()>>,
}

impl KilnServer {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The underlying router, mainly for driving requests in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(mode = %self.mode, %addr, "kiln server listening");
        axum::serve(listener, self.router)
            .await
            .map_err(ServerError::Serve)
    }
}

/// Validate options and construct the pipeline for the resolved mode.
pub async fn create_server(options: ServerOptions) -> Result<KilnServer, ServerError> {
    assert_server_options(&options)?;
    let mode = options.resolved_mode()?;

    match mode {
        Mode::Development => development_server(options).await,
        Mode::Production => production_server(options),
    }
}

async fn development_server(options: ServerOptions) -> Result<KilnServer, ServerError> {
    let root = options.project_root()?.to_path_buf();

    let import_map = ImportMap::load(&options.import_map_path)?;
    let builder = GraphBuilder::new(Resolver::new(root.clone(), import_map));
    let graph = builder.build(&options.browser_entrypoint).await?;
    info!(
        modules = graph.len(),
        entrypoint = %graph.entrypoint(),
        "module graph ready"
    );

    let compiler = Arc::new(Transpiler::new(options.compiler.clone()));
    let state = DevState::new(graph, builder, CompileCache::new(), compiler);

    let (watcher, invalidation) = if options.watch {
        let (watcher, rx) = FileWatcher::new(root)?;
        let task = spawn_invalidation_task(state.clone(), rx);
        (Some(watcher), Some(task))
    } else {
        (None, None)
    };

    let router = Router::new()
        .route(
            &format!("{KILN_COMPILER_PATH}/{{*path}}"),
            get(serve_compiled_module),
        )
        .fallback_service(ServeDir::new(&options.public_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    Ok(KilnServer {
        mode: Mode::Development,
        router,
        _watcher: watcher,
        _invalidation: invalidation,
    })
}

fn production_server(options: ServerOptions) -> Result<KilnServer, ServerError> {
    // Module URLs emitted at development time stay valid in production:
    // the compiler prefix maps straight onto the precompiled output.
    let router = Router::new()
        .nest_service(VENDOR_PATH, ServeDir::new(&options.vendor_dir))
        .nest_service(KILN_STATIC_PATH, ServeDir::new(&options.precompiled_dir))
        .nest_service(KILN_COMPILER_PATH, ServeDir::new(&options.precompiled_dir))
        .fallback_service(ServeDir::new(&options.public_dir));

    Ok(KilnServer {
        mode: Mode::Production,
        router,
        _watcher: None,
        _invalidation: None,
    })
}
