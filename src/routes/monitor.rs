//! # routes::monitor
//!
//! Observer WebSocket.
//!
//! | Method   | Path  | Description                                   |
//! |----------|-------|-----------------------------------------------|
//! | GET (WS) | `/ws` | events, heartbeats, trades, predictions       |
//!
//! A new observer first gets a `strategy_snapshot` (unless the strategy is
//! muted), then every message the [`Broadcaster`](crate::broadcast::Broadcaster)
//! publishes, as JSON text frames.  Both come through the same channel, in
//! `seq` order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::state::SharedState;

pub async fn ws_observer(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // The actor registers the observer and queues the current snapshot
    // ahead of anything it publishes afterwards.
    let (id, mut rx) = match state.handle.attach_observer().await {
        Ok(attached) => attached,
        Err(e) => {
            warn!(error = %e, "Observer rejected");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    info!(%id, observers = state.broadcaster.observer_count(), "🔌 Observer connected");

    // ── Event Loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        debug!(%id, error = %e, "WebSocket read error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = state.token.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.broadcaster.unsubscribe(id);
    info!(%id, "🔌 Observer disconnected");
}
