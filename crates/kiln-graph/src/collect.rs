//! Static import extraction.
//!
//! Parses one module with oxc and records every specifier the module graph
//! cares about: static imports, re-exports, and string-literal dynamic
//! imports. Spans of the quoted literals are kept so the transpiler can
//! splice rewritten specifiers back into the source.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Expression, ExportAllDeclaration, ExportNamedDeclaration, ImportDeclaration, ImportExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType as OxcSourceType;

use crate::import::{Import, ImportKind};
use crate::module::SourceType;
use crate::span::SourceSpan;

/// Error produced when a module cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to parse module: {message}")]
pub struct ParseError {
    pub message: String,
}

/// Extract every import edge from `source`, in source order.
///
/// Dynamic imports with non-literal arguments are ignored; their targets
/// can only be discovered at request time.
pub fn extract_imports(source: &str, source_type: SourceType) -> Result<Vec<Import>, ParseError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, oxc_source_type(source_type)).parse();

    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        let message = if message.is_empty() {
            "parser panicked".to_string()
        } else {
            message
        };
        return Err(ParseError { message });
    }

    let mut collector = ImportCollector::default();
    collector.visit_program(&ret.program);

    let mut imports = collector.imports;
    // Visit order is already source order; sort keeps it deterministic even
    // if traversal internals change.
    imports.sort_by_key(|imp| imp.span.start);
    Ok(imports)
}

/// Map kiln source types onto oxc parser source types. Plain JavaScript is
/// parsed as an ES module since everything served here is module code.
fn oxc_source_type(source_type: SourceType) -> OxcSourceType {
    match source_type {
        SourceType::TypeScript => OxcSourceType::ts(),
        SourceType::Tsx => OxcSourceType::tsx(),
        SourceType::Jsx => OxcSourceType::jsx(),
        SourceType::JavaScript | SourceType::Json | SourceType::Unknown => OxcSourceType::mjs(),
    }
}

#[derive(Default)]
struct ImportCollector {
    imports: Vec<Import>,
}

impl ImportCollector {
    fn record(&mut self, specifier: &str, kind: ImportKind, span: oxc_span::Span) {
        self.imports.push(Import::new(
            specifier.to_string(),
            kind,
            SourceSpan::new(span.start, span.end),
        ));
    }
}

impl<'a> Visit<'a> for ImportCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.record(&it.source.value, ImportKind::Static, it.source.span);
        walk::walk_import_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.record(&source.value, ImportKind::ReExport, source.span);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.record(&it.source.value, ImportKind::ReExport, it.source.span);
        walk::walk_export_all_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.record(&lit.value, ImportKind::Dynamic, lit.span);
        }
        walk::walk_import_expression(self, it);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_static_imports_in_order() {
        let source = r#"
import a from "./a.js";
import { b } from "./b.js";
import "./side-effect.js";
"#;
        let imports = extract_imports(source, SourceType::JavaScript).unwrap();
        let specifiers: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(specifiers, vec!["./a.js", "./b.js", "./side-effect.js"]);
        assert!(imports.iter().all(|i| i.kind == ImportKind::Static));
    }

    #[test]
    fn collects_reexports_and_dynamic_imports() {
        let source = r#"
export * from "./all.js";
export { x } from "./named.js";
const lazy = () => import("./lazy.js");
"#;
        let imports = extract_imports(source, SourceType::JavaScript).unwrap();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].kind, ImportKind::ReExport);
        assert_eq!(imports[1].kind, ImportKind::ReExport);
        assert_eq!(imports[2].kind, ImportKind::Dynamic);
        assert_eq!(imports[2].specifier, "./lazy.js");
    }

    #[test]
    fn ignores_non_literal_dynamic_imports() {
        let source = r#"const load = (name) => import(name);"#;
        let imports = extract_imports(source, SourceType::JavaScript).unwrap();
        assert!(imports.is_empty());
    }

    #[test]
    fn spans_cover_the_quoted_literal() {
        let source = r#"import a from "./a.js";"#;
        let imports = extract_imports(source, SourceType::JavaScript).unwrap();
        let span = imports[0].span;
        assert_eq!(&source[span.start as usize..span.end as usize], "\"./a.js\"");
    }

    #[test]
    fn typescript_sources_parse() {
        let source = r#"
import type { T } from "./types.ts";
import { v }: any from "./v.ts";
"#;
        // The second line is intentionally bogus; a syntax error must be
        // reported, not swallowed.
        assert!(extract_imports(source, SourceType::TypeScript).is_err());

        let ok = extract_imports(
            "import { v } from \"./v.ts\";\nexport const x: number = 1;\n",
            SourceType::TypeScript,
        )
        .unwrap();
        assert_eq!(ok[0].specifier, "./v.ts");
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = extract_imports("import from from;;;;(", SourceType::JavaScript).unwrap_err();
        assert!(!err.message.is_empty());
    }
}
