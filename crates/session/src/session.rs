//! The publish session state machine.
//!
//! `Idle → Connecting → Negotiating → Publishing → Teardown → Done`, with
//! every failure routed through `Teardown` into `Aborted`. The bind runs as
//! a separate task that reports back with a [`BindMessage`]; the session
//! only suspends while waiting for that message or for a remote call.

use std::sync::Arc;

use themelink_catalog::{Catalog, ThemePackage};
use themelink_grants::GrantRegistry;
use themelink_protocol::constants::{ProtocolCompatibility, check_protocol_compatibility};
use themelink_protocol::{AssetUri, PublishBatchRequest};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{RemoteError, SessionError};
use crate::indicator::StatusIndicator;
use crate::remote::{RemoteService, ServiceBinder};
use crate::types::{SessionConfig, SessionReport, SessionState, SkippedPackage};

/// Completion message sent by the bind task.
enum BindMessage {
    Succeeded(Arc<dyn RemoteService>),
    Failed(RemoteError),
}

/// One run of the publish workflow. Consumed by [`run`](Self::run).
pub struct PublishSession {
    id: String,
    config: SessionConfig,
    binder: Arc<dyn ServiceBinder>,
    catalog: Arc<Catalog>,
    grants: Arc<GrantRegistry>,
    indicator: Arc<dyn StatusIndicator>,
    state: SessionState,
    history: Vec<SessionState>,
    remote_version: Option<u32>,
    published: Vec<ThemePackage>,
    skipped: Vec<SkippedPackage>,
}

impl PublishSession {
    /// Creates an idle session.
    pub fn new(
        config: SessionConfig,
        binder: Arc<dyn ServiceBinder>,
        catalog: Arc<Catalog>,
        grants: Arc<GrantRegistry>,
        indicator: Arc<dyn StatusIndicator>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            binder,
            catalog,
            grants,
            indicator,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
            remote_version: None,
            published: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to a terminal state.
    ///
    /// Never fails: the outcome, including any abort reason, is in the
    /// returned report. The binding is released exactly once on every path.
    pub async fn run(mut self) -> SessionReport {
        debug!(session = %self.id, "publish session started");
        self.indicator.show("Sending themes to the remote service");

        let outcome = self.drive().await;

        self.transition(SessionState::Teardown);
        self.binder.unbind().await;
        self.indicator.hide();

        let abort_reason = match outcome {
            Ok(()) => {
                self.transition(SessionState::Done);
                info!(
                    session = %self.id,
                    published = self.published.len(),
                    skipped = self.skipped.len(),
                    "publish session finished"
                );
                None
            }
            Err(e) => {
                self.transition(SessionState::Aborted);
                match &e {
                    SessionError::VersionTooOld { .. } => {
                        warn!(session = %self.id, "{e}");
                    }
                    _ => error!(session = %self.id, error = %e, "publish session aborted"),
                }
                Some(e)
            }
        };

        SessionReport {
            session_id: self.id,
            final_state: self.state,
            history: self.history,
            remote_version: self.remote_version,
            published: self.published,
            skipped: self.skipped,
            abort_reason,
        }
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting);
        let remote = self.await_binding().await?;

        self.transition(SessionState::Negotiating);
        let version = remote.protocol_version().await?;
        self.remote_version = Some(version);
        debug!(session = %self.id, version, "remote protocol version");

        if let ProtocolCompatibility::TooOld {
            peer_version,
            minimum,
        } = check_protocol_compatibility(version, self.config.min_protocol_version)
        {
            return Err(SessionError::VersionTooOld {
                remote: peer_version,
                minimum,
            });
        }

        self.transition(SessionState::Publishing);
        self.publish_all(remote.as_ref()).await
    }

    /// Spawns the bind request and waits for its completion message.
    async fn await_binding(&self) -> Result<Arc<dyn RemoteService>, SessionError> {
        let (tx, mut rx) = mpsc::channel(1);
        let binder = Arc::clone(&self.binder);
        let bind_task = tokio::spawn(async move {
            let msg = match binder.bind().await {
                Ok(remote) => BindMessage::Succeeded(remote),
                Err(e) => BindMessage::Failed(e),
            };
            let _ = tx.send(msg).await;
        });

        match tokio::time::timeout(self.config.bind_timeout, rx.recv()).await {
            Ok(Some(BindMessage::Succeeded(remote))) => Ok(remote),
            Ok(Some(BindMessage::Failed(e))) => Err(e.into()),
            Ok(None) => Err(RemoteError::BindFailed("bind task ended without a result".into()).into()),
            Err(_) => {
                bind_task.abort();
                Err(RemoteError::BindTimeout(self.config.bind_timeout).into())
            }
        }
    }

    /// Publishes every catalog entry, skipping packages that cannot be read.
    async fn publish_all(&mut self, remote: &dyn RemoteService) -> Result<(), SessionError> {
        let ids = match self.catalog.entries() {
            Ok(ids) => ids,
            Err(e) => {
                warn!(session = %self.id, error = %e, "asset root unreadable, nothing to publish");
                return Ok(());
            }
        };

        for id in ids {
            let package = match self.catalog.load_package(&id) {
                Ok(package) => package,
                Err(e) => {
                    warn!(session = %self.id, theme = %id, error = %e, "skipping theme package");
                    self.skipped.push(SkippedPackage {
                        id,
                        reason: SessionError::from(e).to_string(),
                    });
                    continue;
                }
            };
            self.publish_package(remote, package).await?;
        }

        Ok(())
    }

    /// Grants and publishes one package as a unit.
    ///
    /// If the publish call fails the grants added for this package are
    /// revoked. A rejection skips the package; any other failure aborts.
    async fn publish_package(
        &mut self,
        remote: &dyn RemoteService,
        package: ThemePackage,
    ) -> Result<(), SessionError> {
        let grantee = self.config.remote_identity.as_str();
        let added: Vec<AssetUri> = package
            .all_refs()
            .filter(|uri| self.grants.grant_read(uri, grantee))
            .cloned()
            .collect();

        let request = PublishBatchRequest {
            app_id: self.config.app_id.clone(),
            name: package.display_name.clone(),
            description: package.description.clone(),
            author: package.author.clone(),
            thumbnail_uri: package.thumbnail_ref.to_string(),
            member_uris: package.member_refs.iter().map(ToString::to_string).collect(),
        };

        match remote.publish_batch(request).await {
            Ok(()) => {
                info!(
                    session = %self.id,
                    theme = %package.id,
                    members = package.member_refs.len(),
                    "theme published"
                );
                self.published.push(package);
                Ok(())
            }
            Err(e) => {
                for uri in &added {
                    self.grants.revoke(uri, grantee);
                }
                if e.is_communication_fault() {
                    return Err(e.into());
                }
                warn!(session = %self.id, theme = %package.id, error = %e, "theme rejected");
                self.skipped.push(SkippedPackage {
                    id: package.id,
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.id, from = ?self.state, to = ?next, "session state changed");
        self.state = next;
        self.history.push(next);
    }
}
