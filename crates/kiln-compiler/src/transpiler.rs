//! On-demand module transpilation.
//!
//! Turns one module's source into browser-executable code. Import
//! specifiers are rewritten to servable paths under the reserved compiler
//! prefix by splicing over the specifier literals' byte spans, so plain
//! JavaScript passes through line-for-line and stack traces stay accurate.
//! TypeScript and JSX sources are additionally lowered through the oxc
//! transformer after the splice.

use std::path::Path;

use async_trait::async_trait;
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType as OxcSourceType;
use oxc_transformer::{TransformOptions, Transformer};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kiln_graph::{
    extract_imports, ImportKind, Module, ModuleGraph, ModuleId, SourceHash, SourceType,
};

/// Reserved path prefix every compiled module is served under in
/// development mode.
pub const COMPILER_PATH_PREFIX: &str = "/_kiln/compiler";

/// Error produced when a module cannot be compiled. All payloads are owned
/// strings so the error can be broadcast to every request joined on one
/// in-flight compilation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// The graph already holds a resolution or parse diagnostic for this
    /// module; compilation is not attempted.
    #[error("module {id} cannot be compiled: {message}")]
    Errored { id: ModuleId, message: String },

    #[error("failed to read module {id}: {message}")]
    Read { id: ModuleId, message: String },

    #[error("syntax error in {id}: {message}")]
    Parse { id: ModuleId, message: String },

    #[error("failed to lower {id} for the browser: {message}")]
    Transform { id: ModuleId, message: String },

    #[error("module {id} is not servable source: {message}")]
    Unsupported { id: ModuleId, message: String },

    /// The in-flight compilation task disappeared without producing a
    /// result. Should not happen in practice.
    #[error("compilation of {id} was dropped before completing")]
    TaskFailed { id: ModuleId },
}

impl CompileError {
    /// The module the failure belongs to.
    pub fn module_id(&self) -> &ModuleId {
        match self {
            Self::Errored { id, .. }
            | Self::Read { id, .. }
            | Self::Parse { id, .. }
            | Self::Transform { id, .. }
            | Self::Unsupported { id, .. }
            | Self::TaskFailed { id } => id,
        }
    }
}

/// Output of a successful compilation.
#[derive(Debug)]
pub struct CompiledModule {
    pub id: ModuleId,
    /// Fingerprint of the source version this output was produced from;
    /// the cache keys on (id, hash).
    pub source_hash: SourceHash,
    pub code: String,
    /// Module ids this output's rewritten specifiers point at. Direct
    /// targets only; the affected-ancestor set on invalidation comes from
    /// the graph's reverse edges, not from here.
    pub rewrite_deps: Vec<ModuleId>,
}

/// Anything able to compile one module. The cache only depends on this
/// seam, which is what lets tests count invocations.
#[async_trait]
pub trait Compile: Send + Sync {
    async fn compile(
        &self,
        module: &Module,
        graph: &ModuleGraph,
    ) -> Result<CompiledModule, CompileError>;
}

/// Pass-through configuration for the transpiler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspilerOptions {
    /// Prefix rewritten local specifiers are served under.
    pub serve_prefix: String,
}

impl Default for TranspilerOptions {
    fn default() -> Self {
        Self {
            serve_prefix: COMPILER_PATH_PREFIX.to_string(),
        }
    }
}

/// The oxc-backed transpiler.
pub struct Transpiler {
    options: TranspilerOptions,
}

impl Transpiler {
    pub fn new(options: TranspilerOptions) -> Self {
        Self { options }
    }

    /// Servable URL path for a local module id, relative to the project
    /// root when possible.
    fn serve_path(&self, id: &ModuleId, root: &Path) -> String {
        let prefix = &self.options.serve_prefix;
        match id.to_path() {
            Some(path) => match path.strip_prefix(root) {
                Ok(rel) => format!("{prefix}/{}", rel.display()),
                // Outside the project root: encode the absolute path.
                Err(_) => format!("{prefix}{}", path.display()),
            },
            None => id.as_str().to_string(),
        }
    }

    /// Splice rewritten specifiers over their literal spans. Spans are
    /// re-extracted from the source that was just read, so a file edited
    /// after the graph walk cannot shift the splice points.
    fn rewrite_specifiers(
        &self,
        source: &str,
        module: &Module,
        graph: &ModuleGraph,
    ) -> Result<(String, Vec<ModuleId>), CompileError> {
        let current = extract_imports(source, module.source_type).map_err(|err| {
            CompileError::Parse {
                id: module.id.clone(),
                message: err.message,
            }
        })?;

        // Resolution results from the graph walk, looked up per specifier.
        let mut resolved: FxHashMap<(&str, ImportKind), &ModuleId> = FxHashMap::default();
        for import in module.imports.iter() {
            if let Some(target) = &import.resolved_to {
                resolved
                    .entry((import.specifier.as_str(), import.kind))
                    .or_insert(target);
            }
        }

        let mut out = String::with_capacity(source.len() + 64 * current.len());
        let mut cursor = 0usize;
        let mut rewrite_deps = Vec::new();

        for import in &current {
            let Some(target) = resolved
                .get(&(import.specifier.as_str(), import.kind))
                .copied()
            else {
                // Unresolved (typically a non-eager dynamic import): the
                // browser resolves it relative to the compiler prefix.
                continue;
            };
            let replacement = if target.is_remote() {
                target.as_str().to_string()
            } else {
                self.serve_path(target, graph.root())
            };

            let (start, end) = (import.span.start as usize, import.span.end as usize);
            out.push_str(&source[cursor..start]);
            out.push('"');
            out.push_str(&replacement);
            out.push('"');
            cursor = end;
            rewrite_deps.push(target.clone());
        }
        out.push_str(&source[cursor..]);
        Ok((out, rewrite_deps))
    }

    /// Lower TypeScript/JSX to plain JavaScript.
    fn lower(&self, id: &ModuleId, path: &Path, source: &str) -> Result<String, CompileError> {
        let source_type = OxcSourceType::from_path(path).unwrap_or_else(|_| OxcSourceType::tsx());
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if ret.panicked || !ret.errors.is_empty() {
            let message = ret
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CompileError::Parse {
                id: id.clone(),
                message,
            });
        }

        let mut program = ret.program;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let options = TransformOptions::default();
        let transformed =
            Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            let message = transformed
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CompileError::Transform {
                id: id.clone(),
                message,
            });
        }

        Ok(Codegen::new().build(&program).code)
    }
}

#[async_trait]
impl Compile for Transpiler {
    async fn compile(
        &self,
        module: &Module,
        graph: &ModuleGraph,
    ) -> Result<CompiledModule, CompileError> {
        if let Some(message) = &module.error {
            return Err(CompileError::Errored {
                id: module.id.clone(),
                message: message.clone(),
            });
        }
        if module.is_remote {
            return Err(CompileError::Unsupported {
                id: module.id.clone(),
                message: "remote modules are loaded by the browser directly".to_string(),
            });
        }

        let source =
            tokio::fs::read_to_string(&module.path)
                .await
                .map_err(|err| CompileError::Read {
                    id: module.id.clone(),
                    message: err.to_string(),
                })?;

        // JSON modules become a default-exported object.
        if module.source_type == SourceType::Json {
            let code = format!("export default {};\n", source.trim_end());
            return Ok(CompiledModule {
                id: module.id.clone(),
                source_hash: module.source_hash,
                code,
                rewrite_deps: Vec::new(),
            });
        }
        if !module.source_type.is_javascript_like() {
            return Err(CompileError::Unsupported {
                id: module.id.clone(),
                message: format!("unsupported source type {:?}", module.source_type),
            });
        }

        let (rewritten, rewrite_deps) = self.rewrite_specifiers(&source, module, graph)?;
        let code = if module.source_type.needs_lowering() {
            self.lower(&module.id, &module.path, &rewritten)?
        } else {
            rewritten
        };

        debug!(module = %module.id, bytes = code.len(), "compiled module");
        Ok(CompiledModule {
            id: module.id.clone(),
            source_hash: module.source_hash,
            code,
            rewrite_deps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_graph::{GraphBuilder, ImportMap, Resolver};
    use std::fs;
    use tempfile::TempDir;

    async fn fixture(files: &[(&str, &str)]) -> (TempDir, ModuleGraph) {
        let dir = TempDir::new().unwrap();
        for (rel, source) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, source).unwrap();
        }
        let builder = GraphBuilder::new(Resolver::new(dir.path(), ImportMap::empty()));
        let graph = builder.build(&dir.path().join(files[0].0)).await.unwrap();
        (dir, graph)
    }

    fn id(dir: &TempDir, rel: &str) -> ModuleId {
        ModuleId::from_path(dir.path().join(rel)).unwrap()
    }

    #[tokio::test]
    async fn rewrites_static_imports_to_the_compiler_prefix() {
        let (dir, graph) = fixture(&[
            ("main.js", "import { n } from \"./util.js\";\nconsole.log(n);\n"),
            ("util.js", "export const n = 1;\n"),
        ])
        .await;

        let module = graph.module(&id(&dir, "main.js")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        assert!(out.code.contains("\"/_kiln/compiler/util.js\""));
        assert_eq!(out.rewrite_deps, vec![id(&dir, "util.js")]);
    }

    #[tokio::test]
    async fn plain_javascript_output_is_line_preserving() {
        let source = "// header\nimport { n } from \"./util.js\";\n\nconsole.log(n);\n";
        let (dir, graph) = fixture(&[("main.js", source), ("util.js", "export const n = 1;\n")]).await;

        let module = graph.module(&id(&dir, "main.js")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        assert_eq!(
            out.code.lines().count(),
            source.lines().count(),
            "specifier splicing must not add or remove lines"
        );
        assert!(out.code.starts_with("// header\n"));
    }

    #[tokio::test]
    async fn round_trip_rewritten_specifiers_match_graph_edges() {
        let (dir, graph) = fixture(&[
            ("main.js", "import \"./a.js\";\nimport \"./b.js\";\n"),
            ("a.js", "export {};\n"),
            ("b.js", "export {};\n"),
        ])
        .await;

        let module = graph.module(&id(&dir, "main.js")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        // Every rewritten specifier, resolved back through the root, names
        // exactly the graph's edge set for this module.
        let mut resolved_back: Vec<ModuleId> = out
            .code
            .match_indices(COMPILER_PATH_PREFIX)
            .map(|(start, _)| {
                let rest = &out.code[start + COMPILER_PATH_PREFIX.len()..];
                let end = rest.find('"').unwrap();
                ModuleId::from_path(graph.root().join(rest[1..end].to_string())).unwrap()
            })
            .collect();
        resolved_back.sort();
        let mut edges = graph.dependencies_of(&id(&dir, "main.js"));
        edges.sort();
        assert_eq!(resolved_back, edges);
    }

    #[tokio::test]
    async fn typescript_is_lowered_and_rewritten() {
        let (dir, graph) = fixture(&[
            (
                "main.ts",
                "import { n } from \"./util.ts\";\nconst x: number = n;\nconsole.log(x);\n",
            ),
            ("util.ts", "export const n: number = 1;\n"),
        ])
        .await;

        let module = graph.module(&id(&dir, "main.ts")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        assert!(out.code.contains("/_kiln/compiler/util.ts"));
        assert!(!out.code.contains(": number"), "types must be stripped");
    }

    #[tokio::test]
    async fn dynamic_imports_are_rewritten_when_resolved() {
        let (dir, graph) = fixture(&[
            ("main.js", "const p = import(\"./lazy.js\");\n"),
            ("lazy.js", "export {};\n"),
        ])
        .await;

        let module = graph.module(&id(&dir, "main.js")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        assert!(out.code.contains("import(\"/_kiln/compiler/lazy.js\")"));
    }

    #[tokio::test]
    async fn errored_nodes_fail_with_their_recorded_diagnostic() {
        let (dir, graph) = fixture(&[("main.js", "import \"./missing.js\";\n")]).await;

        let module = graph.module(&id(&dir, "missing.js")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let err = transpiler.compile(&module, &graph).await.unwrap_err();

        assert!(matches!(err, CompileError::Errored { .. }));
        assert!(err.to_string().contains("missing.js"));
    }

    #[tokio::test]
    async fn json_modules_become_default_exports() {
        let (dir, graph) = fixture(&[
            ("main.js", "import config from \"./config.json\";\n"),
            ("config.json", "{ \"debug\": true }"),
        ])
        .await;

        let module = graph.module(&id(&dir, "config.json")).unwrap();
        let transpiler = Transpiler::new(TranspilerOptions::default());
        let out = transpiler.compile(&module, &graph).await.unwrap();

        assert_eq!(out.code, "export default { \"debug\": true };\n");
    }
}
