use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Failed to fetch rpc list: {0}")]
    Fetch(#[from] RestError),
    #[error("Rpc list is not a json array of endpoints: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Rpc list entry {index} ({name}) is invalid: {reason}")]
    Invalid {
        index: usize,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Test run {0} not found.")]
    TestRunNotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch was not confirmed.")]
    NotConfirmed,
    #[error("Launch in {region} rejected: {source}")]
    Launch {
        region: String,
        #[source]
        source: RestError,
    },
}

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Endpoints(#[from] EndpointError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(StoreError::Sqlx(e))
    }
}
