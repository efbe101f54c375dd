//! Import edges recorded on a module node.

use serde::{Deserialize, Serialize};

use crate::module_id::ModuleId;
use crate::span::SourceSpan;

/// How a specifier appears in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import ... from "x"` or a bare `import "x"`.
    Static,
    /// `import("x")` with a string-literal argument.
    Dynamic,
    /// `export ... from "x"` / `export * from "x"`.
    ReExport,
}

impl ImportKind {
    /// Static and re-export edges are traversed eagerly during a build
    /// pass; dynamic edges are only followed when the browser requests the
    /// target.
    pub fn is_eager(&self) -> bool {
        matches!(self, Self::Static | Self::ReExport)
    }
}

/// One import statement in a module, in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    /// The specifier exactly as written (no quotes).
    pub specifier: String,
    pub kind: ImportKind,
    /// Byte range of the quoted specifier literal in the module source.
    pub span: SourceSpan,
    /// Canonical target, once resolution has run. Eager edges that fail to
    /// resolve still get a target id, pointing at an errored node; `None`
    /// is left only for dynamic specifiers resolved again at request time.
    pub resolved_to: Option<ModuleId>,
}

impl Import {
    pub fn new(specifier: String, kind: ImportKind, span: SourceSpan) -> Self {
        Self {
            specifier,
            kind,
            span,
            resolved_to: None,
        }
    }
}
