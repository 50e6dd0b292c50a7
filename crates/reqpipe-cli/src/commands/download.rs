use reqpipe_core::ApiClient;

use crate::cli::{Cli, DownloadArgs};
use crate::error::CliError;

use super::base_options;

pub async fn run(client: &ApiClient, cli: &Cli, args: &DownloadArgs) -> Result<(), CliError> {
    let options = base_options(cli)?;
    let bytes = client.download(&args.path, options).await?;

    std::fs::write(&args.output, &bytes)?;
    tracing::info!(
        path = %args.output.display(),
        bytes = bytes.len(),
        "download written"
    );
    Ok(())
}
