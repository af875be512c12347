//! WebSocket transport for the delivery protocol.
//!
//! Each accepted socket gets a [`ConnectionId`] and an unbounded outbound
//! channel registered with the hub. A writer task drains that channel into
//! JSON text frames; the reader loop decodes client frames and hands them
//! to the hub. Malformed frames are logged and dropped, they never kill
//! the connection.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use hearsay_shared::protocol::{ClientEvent, ServerEvent};

use crate::api::AppState;
use crate::hub::Hub;
use crate::presence::ConnectionId;

/// `GET /ws` upgrade handler.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn handle_socket(socket: WebSocket, hub: Hub) {
    let conn = ConnectionId::new();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    hub.attach(conn, tx).await;
    debug!(conn = %conn, "socket connected");

    // Writer half: serialize server events into text frames.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match event.to_json() {
                Ok(json) => WsMessage::Text(json),
                Err(e) => {
                    warn!(error = %e, "failed to encode server event");
                    continue;
                }
            };
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Reader half: decode client frames and hand them to the hub.
    let reader_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                WsMessage::Text(text) => match ClientEvent::from_json(&text) {
                    Ok(event) => reader_hub.handle_event(conn, event).await,
                    Err(e) => {
                        warn!(conn = %conn, error = %e, "ignoring malformed client frame");
                    }
                },
                WsMessage::Close(_) => break,
                // Ping/pong is handled by axum itself.
                _ => {}
            }
        }
    });

    // Whichever half finishes first tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.detach(conn).await;
    debug!(conn = %conn, "socket closed");
}
