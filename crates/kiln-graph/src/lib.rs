//! # kiln-graph
//!
//! Module identifiers, import resolution and the module dependency graph
//! behind kiln's on-demand compiler.
//!
//! The crate is the foundation the dev server builds on:
//!
//! - [`ModuleId`] — canonical, deduplicated identifier for one source file
//!   or remote URL
//! - [`ImportMap`] / [`Resolver`] — specifier-to-id resolution with
//!   longest-prefix import map matching and extension probing
//! - [`ModuleGraph`] — cycle-tolerant directed graph with forward and
//!   reverse edge indexes
//! - [`GraphBuilder`] — the traversal that builds, lazily extends and
//!   invalidates the graph
//!
//! Parsing uses the oxc toolchain; import extraction records the byte span
//! of every specifier literal so the compiler crate can rewrite specifiers
//! without disturbing the rest of the source.
//!
//! ## Thread safety
//!
//! `ModuleGraph` guards its interior with a `parking_lot::RwLock` and
//! applies each mutation in a single lock acquisition. Requests racing an
//! `extend` or `invalidate` observe either the old or the new graph, never
//! a partially updated one.

pub mod builder;
pub mod collect;
pub mod graph;
pub mod import;
pub mod import_map;
pub mod module;
pub mod module_id;
pub mod resolver;
pub mod span;

pub use builder::{GraphBuilder, GraphError};
pub use collect::{extract_imports, ParseError};
pub use graph::ModuleGraph;
pub use import::{Import, ImportKind};
pub use import_map::{ImportMap, ImportMapError};
pub use module::{fingerprint, Module, ModuleBuilder, SourceHash, SourceType};
pub use module_id::{is_remote_specifier, ModuleId, ModuleIdError};
pub use resolver::{ResolveError, Resolver};
pub use span::SourceSpan;
