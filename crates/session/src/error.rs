//! Session error types.

use std::time::Duration;

use themelink_catalog::CatalogError;
use tokio_tungstenite::tungstenite;

/// Errors talking to the remote service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("bind timed out after {0:?}")]
    BindTimeout(Duration),

    #[error("service error {code}: {message}")]
    Service { code: i32, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns `true` when the channel to the service itself failed.
    ///
    /// A [`RemoteError::Rejected`] answer means the service is alive and
    /// refused one batch; everything else leaves the channel unusable.
    pub fn is_communication_fault(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Reasons a publish session aborts or skips work.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("communication fault: {0}")]
    CommunicationFault(#[from] RemoteError),

    #[error(
        "remote service protocol v{remote} is too old (need v{minimum} or newer), please upgrade it"
    )]
    VersionTooOld { remote: u32, minimum: u32 },

    #[error("resource read fault: {0}")]
    ResourceReadFault(#[from] CatalogError),

    #[error("a publish session is already active")]
    AlreadyActive,
}
