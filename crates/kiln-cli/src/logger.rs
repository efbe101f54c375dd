//! Tracing subscriber setup for the CLI.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `--verbose` enables debug output for the kiln crates, `--quiet` keeps
/// errors only, and `RUST_LOG` overrides the default info level when
/// neither flag is set.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("kiln=debug,kiln_graph=debug,kiln_compiler=debug,kiln_server=debug")
    } else if quiet {
        EnvFilter::new("kiln=error,kiln_graph=error,kiln_compiler=error,kiln_server=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("kiln=info,kiln_graph=info,kiln_compiler=info,kiln_server=info")
        })
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
