//! `kiln serve` - production static pipeline over prebuilt output.

use tracing::info;

use kiln_server::{create_server, Mode};

use crate::cli::ServeArgs;
use crate::commands::{absolutize, base_options, run};
use crate::error::Result;

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut options = base_options(&args.common)?.mode(Mode::Production);
    options.precompiled_dir = absolutize(&args.dist_dir)?;
    options.vendor_dir = absolutize(&args.vendor_dir)?;

    info!(
        dist = %options.precompiled_dir.display(),
        vendor = %options.vendor_dir.display(),
        "starting production server"
    );

    let server = create_server(options).await?;
    run(server, &args.common).await
}
