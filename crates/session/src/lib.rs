//! Publish session for the remote theme service.
//!
//! A wake-up signal reaches the [`SessionDispatcher`], which starts at most
//! one [`PublishSession`] at a time. The session binds to the remote
//! service through a [`ServiceBinder`], checks its protocol version,
//! grants read access to every theme resource and publishes one batch per
//! theme package, then releases the binding on every path.
//!
//! [`WsBinder`] is the WebSocket implementation of the remote contract;
//! tests and embedders can plug in their own binder.

pub mod dispatcher;
pub mod error;
pub mod indicator;
mod pumps;
pub mod remote;
pub mod session;
pub mod types;
pub mod ws_client;

pub use dispatcher::{DispatchOutcome, SessionDispatcher};
pub use error::{RemoteError, SessionError};
pub use indicator::{LogIndicator, StatusIndicator};
pub use remote::{RemoteFuture, RemoteService, ServiceBinder};
pub use session::PublishSession;
pub use types::{SessionConfig, SessionReport, SessionState, SkippedPackage, WakeSignal};
pub use ws_client::{WsBinder, WsRemote};
