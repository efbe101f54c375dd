//! Command implementations.

mod dev;
mod serve;

pub use dev::execute as dev_execute;
pub use serve::execute as serve_execute;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::signal;
use tracing::info;

use kiln_server::{KilnServer, ServerOptions};

use crate::cli::CommonArgs;
use crate::error::Result;

/// Resolve a possibly-relative path against the working directory.
///
/// Server options require absolute paths so the project root can be
/// derived from the entrypoint.
fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn base_options(common: &CommonArgs) -> Result<ServerOptions> {
    let mut options = ServerOptions::new(
        absolutize(&common.import_map)?,
        absolutize(&common.entrypoint)?,
    );
    options.public_dir = absolutize(&common.public_dir)?;
    Ok(options)
}

/// Serve until the process receives Ctrl+C.
async fn run(server: KilnServer, common: &CommonArgs) -> Result<()> {
    let addr = SocketAddr::new(common.host, common.port);

    tokio::select! {
        result = server.serve(addr) => result?,
        _ = signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}
