//! Development and production asset server.
//!
//! The server comes in two disjoint flavours selected at startup. In
//! development it owns a live module graph and compiles source modules on
//! demand under a reserved URL prefix, with a file watcher keeping the
//! graph and compile cache fresh. In production it is a plain static file
//! server over prebuilt output and vendored assets.

pub mod constants;
mod middleware;
mod options;
mod server;
mod state;
mod watcher;

pub use constants::{KILN_COMPILER_PATH, KILN_STATIC_PATH, MODULE_CONTENT_TYPE, VENDOR_PATH};
pub use options::{
    assert_server_options, Mode, OptionsError, ServerOptions, MODE_ENV_VAR,
};
pub use server::{create_server, KilnServer, ServerError};
pub use state::DevState;
pub use watcher::{FileChange, FileWatcher};
