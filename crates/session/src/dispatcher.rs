//! Routes wake-up signals to publish sessions.
//!
//! At most one session runs at a time; a query that arrives while one is
//! active is coalesced into it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use themelink_catalog::Catalog;
use themelink_grants::GrantRegistry;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::indicator::StatusIndicator;
use crate::remote::ServiceBinder;
use crate::session::PublishSession;
use crate::types::{SessionConfig, SessionReport, WakeSignal};

/// What [`SessionDispatcher::handle`] did with a signal.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A new session was spawned.
    Started(JoinHandle<SessionReport>),
    /// A session was already running and will serve this query.
    Coalesced,
    /// The signal does not start work.
    Ignored,
}

/// Clears the active flag when the session task ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Entry point for host wake-ups.
pub struct SessionDispatcher {
    config: SessionConfig,
    binder: Arc<dyn ServiceBinder>,
    catalog: Arc<Catalog>,
    grants: Arc<GrantRegistry>,
    indicator: Arc<dyn StatusIndicator>,
    active: Arc<AtomicBool>,
}

impl SessionDispatcher {
    pub fn new(
        config: SessionConfig,
        binder: Arc<dyn ServiceBinder>,
        catalog: Arc<Catalog>,
        grants: Arc<GrantRegistry>,
        indicator: Arc<dyn StatusIndicator>,
    ) -> Self {
        Self {
            config,
            binder,
            catalog,
            grants,
            indicator,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` while a session is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Handles one wake-up. Must be called from within a tokio runtime.
    pub fn handle(&self, signal: WakeSignal) -> DispatchOutcome {
        match signal {
            WakeSignal::QueryRequested => match self.start() {
                Ok(handle) => DispatchOutcome::Started(handle),
                Err(e) => {
                    info!("{e}, query coalesced");
                    DispatchOutcome::Coalesced
                }
            },
            WakeSignal::HostShuttingDown => {
                debug!("host shutting down, no session started");
                DispatchOutcome::Ignored
            }
        }
    }

    /// Spawns a session unless one is already running.
    pub fn start(&self) -> Result<JoinHandle<SessionReport>, SessionError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyActive);
        }

        let guard = ActiveGuard(Arc::clone(&self.active));
        let session = PublishSession::new(
            self.config.clone(),
            Arc::clone(&self.binder),
            Arc::clone(&self.catalog),
            Arc::clone(&self.grants),
            Arc::clone(&self.indicator),
        );
        debug!(session = %session.id(), "dispatching publish session");

        Ok(tokio::spawn(async move {
            let _guard = guard;
            session.run().await
        }))
    }
}
