//! services/api/src/web/ws_handler.rs
//!
//! Pushes session events to a connected browser. A new socket first receives
//! a snapshot, then every event broadcast after it subscribed. A socket that
//! falls behind the broadcast buffer gets a fresh snapshot instead.

use crate::web::{protocol::ServerMessage, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");
    let (mut sender, mut receiver) = socket.split();

    let (mut events, session) = app_state.subscribe_with_snapshot().await;
    if send_message(&mut sender, &ServerMessage::Snapshot { session })
        .await
        .is_err()
    {
        error!("Failed to send session snapshot.");
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    if send_message(&mut sender, &message).await.is_err() {
                        info!("Client went away while sending an event.");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagged behind; resending the snapshot.");
                    let (fresh, session) = app_state.subscribe_with_snapshot().await;
                    events = fresh;
                    if send_message(&mut sender, &ServerMessage::Snapshot { session })
                        .await
                        .is_err()
                    {
                        info!("Client went away while resyncing.");
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            },
        }
    }

    info!("WebSocket connection closed.");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(message).map_err(|e| {
        error!("Failed to serialize server message: {}", e);
    })?;
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
