mod download;
mod get;
mod post;
mod upload;

use std::sync::Arc;
use std::time::Duration;

use reqpipe_core::{
    ApiClient, ApiEnvelope, ClientConfig, EndpointTokenRefresher, NoopTokenRefresher,
    ReqwestHttpClient, RequestOptions, RetryConfig, TokenPair, TokenRefresher, TokenStore,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Option<ApiEnvelope>, CliError> {
    let client = build_client(cli)?;

    match &cli.command {
        Command::Get(args) => get::run(&client, cli, args).await.map(Some),
        Command::Post(args) => post::run(&client, cli, args).await.map(Some),
        Command::Download(args) => download::run(&client, cli, args).await.map(|()| None),
        Command::Upload(args) => upload::run(&client, cli, args).await.map(Some),
    }
}

fn build_client(cli: &Cli) -> Result<ApiClient, CliError> {
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| std::env::var("REQPIPE_BASE_URL").ok())
        .ok_or_else(|| {
            CliError::Argument(String::from("--base-url or REQPIPE_BASE_URL is required"))
        })?;

    let config = ClientConfig::new(base_url)?
        .with_timeout(Duration::from_millis(cli.timeout_ms))?
        .with_retry(RetryConfig::exponential(cli.retries));

    let token_store = build_token_store(cli, &config);
    let mut client = ApiClient::new(config);
    if let Some(store) = token_store {
        client = client.with_token_store(store);
    }
    Ok(client)
}

fn build_token_store(cli: &Cli, config: &ClientConfig) -> Option<Arc<TokenStore>> {
    if cli.bearer.is_none() && cli.refresh_token.is_none() {
        return None;
    }

    let refresher: Arc<dyn TokenRefresher> = match &cli.refresh_url {
        Some(url) => {
            let refresh_url = if url.starts_with("http://") || url.starts_with("https://") {
                url.clone()
            } else {
                format!("{}/{}", config.base_url, url.trim_start_matches('/'))
            };
            let transport = Arc::new(ReqwestHttpClient::new(&config.user_agent));
            Arc::new(EndpointTokenRefresher::new(transport, refresh_url))
        }
        None => Arc::new(NoopTokenRefresher),
    };

    let store = Arc::new(TokenStore::new(refresher));
    store.set(TokenPair::new(
        cli.bearer.clone().unwrap_or_default(),
        cli.refresh_token.clone().unwrap_or_default(),
    ));
    Some(store)
}

/// Request options shared by all subcommands: extra headers and silence.
pub(crate) fn base_options(cli: &Cli) -> Result<RequestOptions, CliError> {
    let mut options = RequestOptions::new();
    for raw in &cli.headers {
        let (name, value) = raw.split_once(':').ok_or_else(|| {
            CliError::Argument(format!("header must be in name:value form: '{raw}'"))
        })?;
        options = options.with_header(name.trim(), value.trim());
    }
    if cli.silent {
        options = options.silent();
    }
    Ok(options)
}
