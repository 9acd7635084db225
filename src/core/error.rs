use rusqlite;
use std::io;
use thiserror::Error;

/// Error taxonomy for the sync engine.
///
/// The split matters operationally: transient variants are eligible for retry
/// and queueing, terminal variants surface to the caller immediately and are
/// never queued.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Transient network error: {0}")]
    TransientNetwork(String),
    #[error("Authorization error: {0}")]
    AuthorizationError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("Protocol error (status {status}): {message}")]
    ProtocolError { status: u16, message: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Transient failures are retried by the transport and, when retries
    /// exhaust, converted into pending mutations. Everything else is terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::TransientNetwork(_) | SyncError::ServerError(_)
        )
    }
}
