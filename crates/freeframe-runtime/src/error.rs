use freeframe_protocol::{DecodeError, ParsePeerIdError, PeerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameworkError {
    #[error("storage entry not found: {module}/{key}")]
    NotFound { module: String, key: String },

    #[error("storage medium unreachable: {0}")]
    Connectivity(String),

    #[error("peer {0} is not connected")]
    PeerNotConnected(PeerId),

    #[error(transparent)]
    InvalidPeerHandle(#[from] ParsePeerIdError),

    #[error("module {module} could not be constructed: {source}")]
    ModuleConstruction {
        module: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("stored payload is malformed: {0}")]
    Decode(#[from] DecodeError),

    #[error("stored cell is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("event payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, FrameworkError>;

impl FrameworkError {
    /// The only error kind the fallback-accepting storage entry points swallow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FrameworkError::NotFound { .. })
    }

    /// Errors that abort the initialisation of a whole process side.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FrameworkError::Connectivity(_) | FrameworkError::Config(_) | FrameworkError::Runtime(_)
        )
    }
}
