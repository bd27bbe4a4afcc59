//! Client error types.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache setup or persistence error.
    #[error("ingest error: {0}")]
    Ingest(#[from] feedcal_ingest::IngestError),

    /// The imported file was rejected.
    #[error("import failed: {0}")]
    Import(#[from] feedcal_providers::ImportError),

    /// Output could not be rendered.
    #[error("output error: {0}")]
    Output(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output(err.to_string())
    }
}
