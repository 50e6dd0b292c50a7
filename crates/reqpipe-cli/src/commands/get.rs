use std::time::Duration;

use reqpipe_core::{ApiClient, ApiEnvelope};

use crate::cli::{Cli, GetArgs};
use crate::error::CliError;

use super::base_options;

pub async fn run(client: &ApiClient, cli: &Cli, args: &GetArgs) -> Result<ApiEnvelope, CliError> {
    let mut options = base_options(cli)?;

    for raw in &args.query {
        let (name, value) = raw.split_once('=').ok_or_else(|| {
            CliError::Argument(format!("query must be in name=value form: '{raw}'"))
        })?;
        options = options.with_query(name, value);
    }

    if let Some(ttl_ms) = args.cache_ttl_ms {
        options = options.cached_for(Duration::from_millis(ttl_ms));
    } else if args.cached {
        options = options.cached();
    }

    if let Some(key) = &args.key {
        options = options.with_key(key);
    }

    Ok(client.get(&args.path, options).await?)
}
