//! WebSocket read pump: routes responses to waiting requests.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use themelink_protocol::constants::WS_MAX_MESSAGE_SIZE;
use themelink_protocol::envelope::Message;

pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Reads messages from the WebSocket until it closes or `cancel` fires.
///
/// Dropping out of the loop drops every pending sender, so callers still
/// waiting on a response observe a closed channel.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            msg = read.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        handle_text_message(&text, &pending).await;
                    }
                    Some(Ok(tungstenite::Message::Ping(data))) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    Some(Ok(tungstenite::Message::Close(_))) => {
                        debug!("received close frame");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    pending.lock().await.clear();
}

async fn handle_text_message(text: &str, pending: &PendingMap) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    match pending.lock().await.remove(&msg.id) {
        Some(tx) => {
            let _ = tx.send(msg);
        }
        None => debug!(msg_type = ?msg.msg_type, id = %msg.id, "unsolicited message dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use themelink_protocol::constants::MessageType;
    use themelink_protocol::messages::ProtocolVersionResponse;

    fn new_pending() -> PendingMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[tokio::test]
    async fn routes_response_to_pending() {
        let pending = new_pending();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("req-1".into(), tx);

        let msg = Message::new(
            "req-1",
            MessageType::ProtocolVersion,
            Some(&ProtocolVersionResponse { version: 40 }),
        )
        .unwrap();
        handle_text_message(&serde_json::to_string(&msg).unwrap(), &pending).await;

        let resp = rx.await.unwrap();
        assert_eq!(resp.msg_type, MessageType::ProtocolVersion);
        let body: ProtocolVersionResponse = resp.parse_payload().unwrap().unwrap();
        assert_eq!(body.version, 40);
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unsolicited_message_leaves_pending_alone() {
        let pending = new_pending();
        let (tx, _rx) = oneshot::channel();
        pending.lock().await.insert("req-1".into(), tx);

        let msg = Message::new::<()>("other", MessageType::OperationResult, None).unwrap();
        handle_text_message(&serde_json::to_string(&msg).unwrap(), &pending).await;

        assert_eq!(pending.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn ignores_malformed_and_oversized() {
        let pending = new_pending();
        handle_text_message("not valid json {{{", &pending).await;
        handle_text_message(&"x".repeat(WS_MAX_MESSAGE_SIZE + 1), &pending).await;
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn stream_end_fails_waiting_requests() {
        let pending = new_pending();
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert("req-1".into(), tx);

        let (write_tx, _write_rx) = mpsc::channel(16);
        let empty = stream::empty::<Result<tungstenite::Message, tungstenite::Error>>();
        read_pump(empty, pending.clone(), write_tx, CancellationToken::new()).await;

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn answers_ping_with_pong() {
        let (write_tx, mut write_rx) = mpsc::channel(16);
        let ping = stream::iter(vec![Ok::<_, tungstenite::Error>(tungstenite::Message::Ping(
            vec![7u8].into(),
        ))]);
        read_pump(ping, new_pending(), write_tx, CancellationToken::new()).await;

        assert!(matches!(
            write_rx.recv().await,
            Some(tungstenite::Message::Pong(_))
        ));
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let cancel = CancellationToken::new();
        let (write_tx, _write_rx) = mpsc::channel(16);
        let silent = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            read_pump(silent, new_pending(), write_tx, c).await;
        });
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }
}
