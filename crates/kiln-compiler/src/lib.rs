//! # kiln-compiler
//!
//! On-demand transpilation for kiln's development server: the oxc-backed
//! [`Transpiler`] that rewrites import specifiers to servable paths (and
//! lowers TypeScript/JSX), and the single-flight [`CompileCache`] that
//! memoizes output per module id and source hash.
//!
//! The cache depends only on the [`Compile`] trait, so the transpiler can
//! be swapped for a stub in tests.

mod cache;
mod transpiler;

pub use cache::CompileCache;
pub use transpiler::{
    Compile, CompiledModule, CompileError, Transpiler, TranspilerOptions, COMPILER_PATH_PREFIX,
};
