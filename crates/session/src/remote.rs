//! Remote service seam.
//!
//! The session only sees these traits; [`crate::ws_client`] implements
//! them over WebSocket and tests implement them with in-memory mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use themelink_protocol::PublishBatchRequest;

use crate::error::RemoteError;

/// A boxed future returned by remote calls.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// The remote theme service contract.
pub trait RemoteService: Send + Sync {
    /// Queries the service's protocol version.
    fn protocol_version(&self) -> RemoteFuture<'_, u32>;

    /// Hands one theme package description to the service.
    fn publish_batch(&self, request: PublishBatchRequest) -> RemoteFuture<'_, ()>;
}

/// Establishes and releases the binding to the remote service.
///
/// A session calls [`bind`](Self::bind) at most once and
/// [`unbind`](Self::unbind) exactly once, whether or not the bind succeeded.
pub trait ServiceBinder: Send + Sync + 'static {
    /// Requests a binding. Resolves once the service is reachable.
    fn bind(&self) -> RemoteFuture<'_, Arc<dyn RemoteService>>;

    /// Releases whatever binding is held. A no-op when nothing is bound.
    fn unbind(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
