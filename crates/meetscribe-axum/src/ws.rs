//! `GET /api/voice/ws` — the push side of the file-status data plane.
//!
//! Every open socket is one Hub session. Three tasks cooperate per
//! connection:
//!
//! * **egress** — drains the Hub's per-session `ProgressEvent` channel and
//!   queues a `file_status` frame for each one.
//! * **ingest** — reads client `subscribe`/`unsubscribe` frames, updates the
//!   Hub's per-session interest set, and queues the corresponding ack.
//! * **writer** — the only task that owns the socket's send half, draining
//!   a shared queue so both of the above can push frames without racing on
//!   one `Sink`.
//!
//! `tokio::select!` waits for whichever of ingest/egress finishes first
//! (graceful close or network drop) and aborts the other, then the writer
//! is aborted and the session is detached from the Hub.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use crate::dto::{WsClientMessage, WsServerMessage};
use crate::state::AppState;

const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// `GET /api/voice/ws` — upgrade to the Hub's push channel.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(socket: WebSocket, state: AppState) {
    let (session_id, mut events) = state.hub.attach();
    let (ws_sender, mut ws_receiver) = socket.split();

    let (out_tx, mut out_rx) = tokio::sync::mpsc::channel::<Message>(OUTBOUND_QUEUE_CAPACITY);

    if let Ok(text) = serde_json::to_string(&WsServerMessage::Connected) {
        let _ = out_tx.try_send(Message::Text(text));
    }

    let mut writer = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = out_rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let egress_tx = out_tx.clone();
    let mut egress = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let msg = WsServerMessage::FileStatus {
                file_id: event.file_id,
                status: event.state,
                progress: event.progress,
                message: event.message,
            };
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if egress_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let hub = state.hub.clone();
    let ingest_tx = out_tx;
    let mut ingest = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<WsClientMessage>(&text) {
                Ok(WsClientMessage::Subscribe { file_id }) => {
                    hub.subscribe(session_id, file_id);
                    Some(WsServerMessage::Subscribed { file_id })
                }
                Ok(WsClientMessage::Unsubscribe { file_id }) => {
                    hub.unsubscribe(session_id, file_id);
                    Some(WsServerMessage::Unsubscribed { file_id })
                }
                Err(err) => {
                    tracing::debug!(
                        target: "meetscribe.ws",
                        error = %err,
                        "malformed client message"
                    );
                    None
                }
            };

            if let Some(reply) = reply {
                let Ok(text) = serde_json::to_string(&reply) else {
                    continue;
                };
                if ingest_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }
    writer.abort();

    state.hub.detach(session_id);
}
