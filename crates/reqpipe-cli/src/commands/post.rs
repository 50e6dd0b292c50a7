use reqpipe_core::{ApiClient, ApiEnvelope};

use crate::cli::{Cli, PostArgs};
use crate::error::CliError;

use super::base_options;

pub async fn run(client: &ApiClient, cli: &Cli, args: &PostArgs) -> Result<ApiEnvelope, CliError> {
    let body: serde_json::Value = serde_json::from_str(&args.data)
        .map_err(|error| CliError::Argument(format!("--data is not valid JSON: {error}")))?;

    let options = base_options(cli)?;
    Ok(client.post(&args.path, body, options).await?)
}
