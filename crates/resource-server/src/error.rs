//! Error types for the resource server.

use std::path::PathBuf;

/// Reasons an open request is refused.
///
/// On the wire every variant is reported as not-found.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid resource identifier: {0}")]
    InvalidIdentifier(String),

    #[error("resource not granted: {0}")]
    NotGranted(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("write access denied (mode {0:?})")]
    WriteDenied(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced by the TCP front-end.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}
