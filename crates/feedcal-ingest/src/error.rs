//! Ingestion error types.

use std::io;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors raised by the cache's own I/O and setup.
///
/// Per-source fetch and parse failures never show up here; they are logged
/// and the source contributes no events.
#[derive(Debug, Error)]
pub enum IngestError {
    /// IO error (snapshot file, directories).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The snapshot file decoded but its content is unusable.
    #[error("Invalid snapshot: {message}")]
    InvalidSnapshot { message: String },

    /// Building a fetcher failed.
    #[error("Provider error: {0}")]
    Provider(#[from] feedcal_providers::ProviderError),
}

impl IngestError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            message: message.into(),
        }
    }
}
