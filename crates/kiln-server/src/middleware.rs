//! Compiler middleware.
//!
//! Handles requests under the reserved compiler prefix: maps the path
//! suffix back to a module id, lazily extends the graph for modules first
//! seen at request time (dynamic imports, newly created files), and
//! responds with compiled code from the cache. Resolution and compile
//! failures become client-error responses carrying the diagnostic; they
//! never take the server down.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as RequestPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use kiln_compiler::{CompiledModule, CompileError};
use kiln_graph::{Module, ModuleId};
use path_clean::PathClean;

use crate::constants::MODULE_CONTENT_TYPE;
use crate::state::DevState;

/// Axum handler for `GET {compiler prefix}/{*path}`.
pub async fn serve_compiled_module(
    State(state): State<DevState>,
    RequestPath(path): RequestPath<String>,
) -> Response {
    match compile_for_request(&state, &path).await {
        Ok(output) => {
            debug!(
                module = %output.id,
                deps = output.rewrite_deps.len(),
                "serving compiled module"
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, MODULE_CONTENT_TYPE),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                output.code.clone(),
            )
                .into_response()
        }
        Err(response) => response,
    }
}

async fn compile_for_request(
    state: &DevState,
    request_path: &str,
) -> Result<Arc<CompiledModule>, Response> {
    let module = lookup_module(state, request_path).await?;

    state
        .cache
        .get_or_compile(module, state.graph.clone(), state.compiler.clone())
        .await
        .map_err(|err| {
            warn!(module = %err.module_id(), error = %err, "compile failed");
            diagnostic_response(compile_error_status(&err), &err.to_string())
        })
}

/// Map the request path onto a graph module, extending the graph when the
/// module is not known yet.
async fn lookup_module(state: &DevState, request_path: &str) -> Result<Arc<Module>, Response> {
    let resolver = state.builder.resolver();

    // Exact nodes first: errored placeholders live at the literal path
    // even though no file exists there, and modules outside the project
    // root are addressed by their full absolute path.
    let rel = request_path.trim_start_matches('/');
    let candidates = [
        resolver.root().join(rel).clean(),
        PathBuf::from(format!("/{rel}")).clean(),
    ];
    for candidate in candidates {
        if let Ok(id) = ModuleId::from_path(&candidate) {
            if let Some(module) = state.graph.module(&id) {
                return Ok(module);
            }
        }
    }

    let id = resolver.resolve_request_path(request_path).map_err(|err| {
        debug!(path = request_path, error = %err, "module resolution failed");
        diagnostic_response(StatusCode::NOT_FOUND, &err.to_string())
    })?;

    if !state.graph.contains(&id) {
        state
            .builder
            .extend(&state.graph, id.clone())
            .await
            .map_err(|err| {
                diagnostic_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
            })?;
    }

    state.graph.module(&id).ok_or_else(|| {
        diagnostic_response(
            StatusCode::NOT_FOUND,
            &format!("module {id} is not part of the graph"),
        )
    })
}

fn compile_error_status(err: &CompileError) -> StatusCode {
    match err {
        CompileError::Errored { .. }
        | CompileError::Parse { .. }
        | CompileError::Transform { .. }
        | CompileError::Unsupported { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CompileError::Read { .. } => StatusCode::NOT_FOUND,
        CompileError::TaskFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn diagnostic_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.to_string(),
    )
        .into_response()
}
