//! Reserved path prefixes.

/// Prefix every on-demand compiled module is served under in development
/// mode. The suffix encodes the module path relative to the project root.
pub use kiln_compiler::COMPILER_PATH_PREFIX as KILN_COMPILER_PATH;

/// Prefix precompiled build output is served under in production mode.
pub const KILN_STATIC_PATH: &str = "/_kiln/static";

/// Prefix third-party assets are served under verbatim in production mode.
pub const VENDOR_PATH: &str = "/vendor";

/// Content type browsers accept for executable module code.
pub const MODULE_CONTENT_TYPE: &str = "text/javascript; charset=utf-8";
