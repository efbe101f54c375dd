//! `kiln dev` - development server with on-demand compilation.

use tracing::info;

use kiln_server::{create_server, Mode};

use crate::cli::DevArgs;
use crate::commands::{base_options, run};
use crate::error::Result;

pub async fn execute(args: DevArgs) -> Result<()> {
    let options = base_options(&args.common)?
        .mode(Mode::Development)
        .watch(!args.no_watch);

    info!(
        entrypoint = %options.browser_entrypoint.display(),
        "starting development server"
    );

    let server = create_server(options).await?;
    run(server, &args.common).await
}
