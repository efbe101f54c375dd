//! Kiln CLI entry point: argument parsing, logger setup and command
//! dispatch.

mod cli;
mod commands;
mod error;
mod logger;

use clap::Parser;
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);

    let result = match args.command {
        cli::Command::Dev(dev_args) => commands::dev_execute(dev_args).await,
        cli::Command::Serve(serve_args) => commands::serve_execute(serve_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
