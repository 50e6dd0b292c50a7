use reqpipe_core::{ApiClient, ApiEnvelope};

use crate::cli::{Cli, UploadArgs};
use crate::error::CliError;

use super::base_options;

pub async fn run(client: &ApiClient, cli: &Cli, args: &UploadArgs) -> Result<ApiEnvelope, CliError> {
    let bytes = std::fs::read(&args.file)?;
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("upload.bin"));

    let options = base_options(cli)?;
    Ok(client
        .upload(&args.path, &args.field, &file_name, bytes, options)
        .await?)
}
