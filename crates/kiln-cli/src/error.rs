//! CLI error type and miette conversion.

use thiserror::Error;

use kiln_server::{OptionsError, ServerError};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a CLI error as a miette report, attaching a hint where one is
/// known to help.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Server(ServerError::Options(e)) => options_error_to_miette(e),
        CliError::Server(ServerError::Bind { addr, source }) => miette::miette!(
            help = "choose a different port with --port",
            "failed to bind {addr}: {source}"
        ),
        other => miette::miette!("{other}"),
    }
}

fn options_error_to_miette(err: OptionsError) -> miette::Report {
    match &err {
        OptionsError::ImportMapNotFound(path) => miette::miette!(
            help = "pass --import-map or create importMap.json next to the entrypoint",
            "an import map was not found at path \"{}\"",
            path.display()
        ),
        OptionsError::EntrypointNotFound(path) => miette::miette!(
            help = "pass the entrypoint as the first argument",
            "a browser entrypoint was not found at path \"{}\"",
            path.display()
        ),
        _ => miette::miette!("{err}"),
    }
}
