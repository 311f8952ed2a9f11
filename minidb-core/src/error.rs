use minidb_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MiniDbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to resolve linked profile '{profile}': {source}")]
    LinkResolution {
        profile: String,
        #[source]
        source: ClientError,
    },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] ClientError),

    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("Malformed JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MiniDbError>;
