use thiserror::Error;

use reqpipe_core::ErrorKind;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] reqpipe_core::ConfigError),

    #[error(transparent)]
    Api(#[from] reqpipe_core::ApiError),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Argument(_) => 2,
            Self::Api(error) => match error.kind() {
                ErrorKind::Validation => 2,
                ErrorKind::Business => 3,
                ErrorKind::System => 4,
                ErrorKind::Network => 6,
                ErrorKind::Authentication | ErrorKind::Authorization => 7,
                ErrorKind::Unknown => 1,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
