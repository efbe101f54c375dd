//! Server startup configuration.
//!
//! Options are validated once, before any component is constructed; a
//! validation failure is the only error allowed to abort the whole server.
//! Core components may assume the paths here exist and are well-formed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use kiln_compiler::TranspilerOptions;

/// Environment variable overriding the default mode when the caller does
/// not set one explicitly.
pub const MODE_ENV_VAR: &str = "KILN_MODE";

/// Error surfaced by startup validation.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error(
        "invalid value supplied for \"mode\", expected either \"production\" or \"development\" received \"{0}\""
    )]
    InvalidMode(String),

    #[error("an import map was not found at path \"{}\"", .0.display())]
    ImportMapNotFound(PathBuf),

    #[error("a browser entrypoint was not found at path \"{}\"", .0.display())]
    EntrypointNotFound(PathBuf),

    #[error("browser entrypoint \"{}\" has no parent directory", .0.display())]
    NoProjectRoot(PathBuf),
}

/// Which pipeline the server wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl FromStr for Mode {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(OptionsError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Startup configuration handed to [`crate::create_server`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    /// Explicit mode; `None` falls back to `KILN_MODE`, then development.
    pub mode: Option<Mode>,
    pub import_map_path: PathBuf,
    pub browser_entrypoint: PathBuf,
    /// Catch-all static asset root, served last.
    pub public_dir: PathBuf,
    /// Third-party assets served verbatim in production mode.
    pub vendor_dir: PathBuf,
    /// Precompiled build output served in production mode.
    pub precompiled_dir: PathBuf,
    /// Pass-through configuration for the transpiler.
    pub compiler: TranspilerOptions,
    /// Watch the source tree and invalidate on change (development only).
    pub watch: bool,
}

impl ServerOptions {
    pub fn new(import_map_path: impl Into<PathBuf>, browser_entrypoint: impl Into<PathBuf>) -> Self {
        Self {
            mode: None,
            import_map_path: import_map_path.into(),
            browser_entrypoint: browser_entrypoint.into(),
            public_dir: PathBuf::from("public"),
            vendor_dir: PathBuf::from("vendor"),
            precompiled_dir: PathBuf::from("dist"),
            compiler: TranspilerOptions::default(),
            watch: true,
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Explicit mode, then the `KILN_MODE` environment variable, then
    /// development.
    pub fn resolved_mode(&self) -> Result<Mode, OptionsError> {
        if let Some(mode) = self.mode {
            return Ok(mode);
        }
        match std::env::var(MODE_ENV_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Mode::Development),
        }
    }

    /// Project root: the entrypoint's parent directory.
    pub fn project_root(&self) -> Result<&Path, OptionsError> {
        self.browser_entrypoint
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| OptionsError::NoProjectRoot(self.browser_entrypoint.clone()))
    }
}

/// Validate options before any component is constructed.
pub fn assert_server_options(options: &ServerOptions) -> Result<(), OptionsError> {
    if !options.import_map_path.is_file() {
        return Err(OptionsError::ImportMapNotFound(
            options.import_map_path.clone(),
        ));
    }
    if !options.browser_entrypoint.is_file() {
        return Err(OptionsError::EntrypointNotFound(
            options.browser_entrypoint.clone(),
        ));
    }
    options.project_root()?;
    Ok(())
}
