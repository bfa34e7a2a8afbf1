//! WebSocket transport for the remote theme service.
//!
//! Request/response with UUID correlation: every request carries a fresh
//! id, the read pump hands the matching response back through a oneshot.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use themelink_protocol::constants::{MessageType, REMOTE_REQUEST_TIMEOUT, WS_MAX_MESSAGE_SIZE};
use themelink_protocol::envelope::Message;
use themelink_protocol::messages::{OperationResult, ProtocolVersionResponse, PublishBatchRequest};

use crate::error::RemoteError;
use crate::pumps::read::PendingMap;
use crate::remote::{RemoteFuture, RemoteService, ServiceBinder};

/// A live WebSocket connection to the remote theme service.
pub struct WsRemote {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    cancel: CancellationToken,
}

impl WsRemote {
    /// Opens a connection and starts the pumps.
    pub async fn connect(url: &str) -> Result<Self, RemoteError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(64);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            cancel.clone(),
        ));
        let read_handle = tokio::spawn(crate::pumps::read::read_pump(
            read,
            pending.clone(),
            write_tx.clone(),
            cancel.clone(),
        ));

        debug!(%url, "connected to remote service");

        Ok(Self {
            write_tx,
            pending,
            _read_handle: read_handle,
            _write_handle: write_handle,
            cancel,
        })
    }

    /// Sends a request and waits for the response.
    pub async fn send_request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, RemoteError> {
        if self.cancel.is_cancelled() {
            return Err(RemoteError::Closed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self
            .write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(RemoteError::Closed);
        }

        let result = tokio::time::timeout(REMOTE_REQUEST_TIMEOUT, rx).await;
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(resp)) => {
                if let Some(err) = &resp.error {
                    return Err(RemoteError::Service {
                        code: err.code,
                        message: err.message.clone(),
                    });
                }
                Ok(resp)
            }
            Ok(Err(_)) => Err(RemoteError::Closed),
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        let _ = self.write_tx.send(tungstenite::Message::Close(None)).await;
        self.cancel.cancel();
    }

    fn expect_type(resp: &Message, expected: MessageType) -> Result<(), RemoteError> {
        if resp.msg_type == expected {
            Ok(())
        } else {
            Err(RemoteError::UnexpectedResponse(format!(
                "expected {expected:?}, got {:?}",
                resp.msg_type
            )))
        }
    }
}

impl RemoteService for WsRemote {
    fn protocol_version(&self) -> RemoteFuture<'_, u32> {
        Box::pin(async move {
            let resp = self
                .send_request::<()>(MessageType::GetProtocolVersion, None)
                .await?;
            Self::expect_type(&resp, MessageType::ProtocolVersion)?;
            let body: ProtocolVersionResponse = resp.parse_payload()?.ok_or_else(|| {
                RemoteError::UnexpectedResponse("protocol_version without payload".into())
            })?;
            Ok(body.version)
        })
    }

    fn publish_batch(&self, request: PublishBatchRequest) -> RemoteFuture<'_, ()> {
        Box::pin(async move {
            let resp = self
                .send_request(MessageType::PublishBatch, Some(&request))
                .await?;
            Self::expect_type(&resp, MessageType::OperationResult)?;
            let result: OperationResult = resp.parse_payload()?.ok_or_else(|| {
                RemoteError::UnexpectedResponse("operation_result without payload".into())
            })?;
            if result.success {
                Ok(())
            } else {
                Err(RemoteError::Rejected(
                    result.message.unwrap_or_else(|| "no reason given".into()),
                ))
            }
        })
    }
}

impl Drop for WsRemote {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
    }
}

/// [`ServiceBinder`] that connects to the service's WebSocket endpoint.
pub struct WsBinder {
    url: String,
    bound: Mutex<Option<Arc<WsRemote>>>,
}

impl WsBinder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bound: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn is_bound(&self) -> bool {
        self.bound.lock().await.is_some()
    }
}

impl ServiceBinder for WsBinder {
    fn bind(&self) -> RemoteFuture<'_, Arc<dyn RemoteService>> {
        Box::pin(async move {
            let remote = WsRemote::connect(&self.url)
                .await
                .map_err(|e| RemoteError::BindFailed(format!("{}: {e}", self.url)))?;
            let remote = Arc::new(remote);
            *self.bound.lock().await = Some(Arc::clone(&remote));
            debug!(url = %self.url, "bound to remote service");
            Ok(remote as Arc<dyn RemoteService>)
        })
    }

    fn unbind(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Some(remote) = self.bound.lock().await.take() {
                remote.close().await;
                debug!(url = %self.url, "unbound from remote service");
            }
        })
    }
}
