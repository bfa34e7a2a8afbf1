//! Application orchestrator: wires the plugin components together.

use std::sync::Arc;

use themelink_catalog::Catalog;
use themelink_grants::GrantRegistry;
use themelink_resource_server::{AssetProvider, ResourceServer};
use themelink_session::{
    DispatchOutcome, LogIndicator, SessionDispatcher, SessionReport, WakeSignal, WsBinder,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the plugin until the host shuts it down.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let assets = config.assets_path();
    let grants = Arc::new(GrantRegistry::new());

    // -- Resource server --
    let provider = Arc::new(AssetProvider::new(
        &assets,
        config.app_id.clone(),
        Arc::clone(&grants),
    ));
    let server = ResourceServer::new(provider, config.server_config(), cancel.child_token());
    let listener = server.listen().await?;
    tracing::info!(addr = %listener.local_addr()?, "resource server ready");
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            tracing::error!("resource server error: {e}");
        }
    });

    // -- Session dispatcher --
    let dispatcher = SessionDispatcher::new(
        config.session_config(),
        Arc::new(WsBinder::new(config.remote_url.clone())),
        Arc::new(Catalog::new(&assets, config.app_id.clone())),
        grants,
        Arc::new(LogIndicator::new("themelink")),
    );

    tracing::info!(assets = %assets.display(), remote = %config.remote_url, "plugin ready");

    // -- Main loop: route host signals --
    let mut wake = WakeSource::new()?;
    let mut reporter: Option<JoinHandle<()>> = None;

    loop {
        let signal = wake.next().await;
        match dispatcher.handle(signal) {
            DispatchOutcome::Started(session) => {
                reporter = Some(tokio::spawn(report(session)));
            }
            DispatchOutcome::Coalesced | DispatchOutcome::Ignored => {}
        }
        if signal == WakeSignal::HostShuttingDown {
            tracing::info!("host shutting down");
            break;
        }
    }

    // -- Graceful shutdown --
    if let Some(reporter) = reporter.filter(|_| dispatcher.is_active()) {
        tracing::info!("waiting for the active publish session");
        let _ = reporter.await;
    }
    cancel.cancel();
    let _ = server_task.await;

    Ok(())
}

async fn report(session: JoinHandle<SessionReport>) {
    match session.await {
        // the session already logged its outcome
        Ok(report) => tracing::debug!(
            session = %report.session_id,
            state = ?report.final_state,
            published = report.published.len(),
            skipped = report.skipped.len(),
            "publish session report"
        ),
        Err(e) => tracing::error!("publish session task failed: {e}"),
    }
}

/// Host wake-ups: `SIGUSR1` asks for the theme list, `SIGTERM` or Ctrl-C
/// means the host is going away.
struct WakeSource {
    #[cfg(unix)]
    query: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl WakeSource {
    fn new() -> anyhow::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                query: signal(SignalKind::user_defined1())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    #[cfg(unix)]
    async fn next(&mut self) -> WakeSignal {
        tokio::select! {
            _ = self.query.recv() => {
                tracing::debug!("SIGUSR1 received");
                WakeSignal::QueryRequested
            }
            _ = self.terminate.recv() => {
                tracing::info!("SIGTERM received");
                WakeSignal::HostShuttingDown
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received");
                WakeSignal::HostShuttingDown
            }
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> WakeSignal {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Ctrl-C received");
        WakeSignal::HostShuttingDown
    }
}
