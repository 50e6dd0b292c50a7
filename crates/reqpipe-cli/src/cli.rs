//! CLI argument definitions for reqpipe.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `get` | GET a path and print the normalized envelope |
//! | `post` | POST a JSON body |
//! | `download` | Fetch raw bytes and write them to a file |
//! | `upload` | Upload a file as `multipart/form-data` |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--base-url` | `$REQPIPE_BASE_URL` | Target API base URL |
//! | `--bearer` | none | Access token for `Authorization: Bearer` |
//! | `--refresh-token` | none | Refresh token for 401 recovery |
//! | `--refresh-url` | none | Token refresh endpoint |
//! | `--timeout-ms` | `30000` | Request timeout in ms |
//! | `--retries` | `3` | Max automatic retries (network/5xx) |
//! | `--header` | none | Extra `name:value` header (repeatable) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--silent` | `false` | Skip error logging/notification |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// reqpipe - request pipeline driver
///
/// Sends requests through the orchestration pipeline (auth refresh, retry,
/// caching, cancellation) and prints the normalized response envelope.
#[derive(Debug, Parser)]
#[command(
    name = "reqpipe",
    author,
    version,
    about = "HTTP request pipeline driver"
)]
pub struct Cli {
    /// Base URL of the target API (falls back to REQPIPE_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer access token attached to every request
    #[arg(long, global = true)]
    pub bearer: Option<String>,

    /// Refresh token used for one-shot 401 recovery
    #[arg(long, global = true)]
    pub refresh_token: Option<String>,

    /// Token refresh endpoint (absolute URL or path on the base URL)
    #[arg(long, global = true)]
    pub refresh_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Maximum automatic retries for network/5xx failures
    #[arg(long, global = true, default_value_t = 3)]
    pub retries: u32,

    /// Extra header in `name:value` form (repeatable)
    #[arg(long = "header", global = true)]
    pub headers: Vec<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress error side effects (structured log, listeners)
    #[arg(long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// GET a path and print the normalized envelope
    Get(GetArgs),
    /// POST a JSON body and print the normalized envelope
    Post(PostArgs),
    /// Fetch raw bytes and write them to a file
    Download(DownloadArgs),
    /// Upload a file as multipart/form-data
    Upload(UploadArgs),
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Request path, e.g. /api/v1/users
    pub path: String,

    /// Query pair in `name=value` form (repeatable)
    #[arg(long = "query")]
    pub query: Vec<String>,

    /// Serve and fill the response cache
    #[arg(long)]
    pub cached: bool,

    /// Cache TTL override in milliseconds (implies --cached)
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,

    /// Explicit request key for cancellation/loading/retry accounting
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Debug, Args)]
pub struct PostArgs {
    /// Request path
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: String,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Request path
    pub path: String,

    /// Destination file
    #[arg(long, short)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Request path
    pub path: String,

    /// File to upload
    #[arg(long)]
    pub file: PathBuf,

    /// Multipart field name
    #[arg(long, default_value = "file")]
    pub field: String,
}
