//! Command-line interface definition.
//!
//! Two commands map onto the two server modes: `kiln dev` runs the
//! on-demand compiler pipeline, `kiln serve` runs the production static
//! pipeline over prebuilt output.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Kiln - a development-time module compiler and asset server
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Compile and serve browser modules on demand"
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server with on-demand compilation
    Dev(DevArgs),
    /// Serve prebuilt output and vendored assets
    Serve(ServeArgs),
}

/// Options shared by both commands.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Browser entrypoint module
    #[arg(default_value = "main.js")]
    pub entrypoint: PathBuf,

    /// Import map used to resolve bare and remote specifiers
    #[arg(long, default_value = "importMap.json")]
    pub import_map: PathBuf,

    /// Directory of static assets served as a fallback
    #[arg(long, default_value = "public")]
    pub public_dir: PathBuf,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to bind
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct DevArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Disable the file watcher
    #[arg(long)]
    pub no_watch: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory of precompiled build output
    #[arg(long, default_value = "dist")]
    pub dist_dir: PathBuf,

    /// Directory of vendored third-party assets
    #[arg(long, default_value = "vendor")]
    pub vendor_dir: PathBuf,
}
