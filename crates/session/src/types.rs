//! Public types for the publish session.

use std::time::Duration;

use themelink_catalog::ThemePackage;
use themelink_protocol::MIN_SUPPORTED_VERSION;
use themelink_protocol::constants::DEFAULT_BIND_TIMEOUT;

use crate::error::SessionError;

/// Publish session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, waiting for a wake-up.
    Idle,
    /// Bind request issued, waiting for the binder to report back.
    Connecting,
    /// Bound; querying the remote protocol version.
    Negotiating,
    /// Granting access and publishing theme packages.
    Publishing,
    /// Releasing the binding.
    Teardown,
    /// Finished normally.
    Done,
    /// Finished early; see [`SessionReport::abort_reason`].
    Aborted,
}

/// External wake-up delivered by the host's dispatch facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSignal {
    /// The remote service wants the theme list.
    QueryRequested,
    /// The host application is going away.
    HostShuttingDown,
}

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Our application id; authority of every resource identifier.
    pub app_id: String,
    /// Identity of the remote service, recorded as grantee.
    pub remote_identity: String,
    /// Lowest remote protocol version we publish to.
    pub min_protocol_version: u32,
    /// Upper bound on waiting for the bind to complete.
    pub bind_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: "org.themelink.plugin".into(),
            remote_identity: "org.themelink.service".into(),
            min_protocol_version: MIN_SUPPORTED_VERSION,
            bind_timeout: DEFAULT_BIND_TIMEOUT,
        }
    }
}

/// A theme package that was not published, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub id: String,
    pub reason: String,
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    pub session_id: String,
    pub final_state: SessionState,
    /// Every state entered, in order, starting with `Idle`.
    pub history: Vec<SessionState>,
    pub remote_version: Option<u32>,
    pub published: Vec<ThemePackage>,
    pub skipped: Vec<SkippedPackage>,
    pub abort_reason: Option<SessionError>,
}

impl SessionReport {
    /// Ids of the packages the service accepted.
    pub fn published_ids(&self) -> Vec<&str> {
        self.published.iter().map(|p| p.id.as_str()).collect()
    }
}
