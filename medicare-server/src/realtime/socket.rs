use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::AppState;

use super::protocol::{parse_client_frame, ClientFrame, ClientMessage};
use super::registry::{Outbox, SocketId};
use super::RealtimeHub;

/// GET /ws
pub async fn ws_upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_connection(socket, hub))
}

/// Drive one socket until it closes.
///
/// A writer task owns the sink and drains the outbox; the reader loop turns
/// client frames into hub commands. Nothing is ever sent back for bad frames.
pub async fn run_connection(socket: WebSocket, hub: RealtimeHub) {
    let socket_id = hub.next_socket_id();
    let (sink, mut stream) = socket.split();
    let (outbox, rx) = mpsc::unbounded_channel::<String>();

    tracing::info!(socket = %socket_id, "WebSocket connected");

    let writer_handle = tokio::spawn(writer_task(sink, rx));

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => handle_text(&hub, socket_id, &outbox, text.as_str()),
            Some(Ok(Message::Binary(data))) => {
                tracing::debug!(socket = %socket_id, bytes = data.len(), "Ignoring binary frame");
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(socket = %socket_id, reason = ?frame, "Client initiated close");
                break;
            }
            // Ping/pong are answered by the transport
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(socket = %socket_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(socket = %socket_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    hub.close(socket_id);
}

fn handle_text(hub: &RealtimeHub, socket: SocketId, outbox: &Outbox, text: &str) {
    match parse_client_frame(text) {
        ClientFrame::Known(ClientMessage::Credentials { credentials }) => {
            hub.credentials(socket, outbox.clone(), credentials);
        }
        ClientFrame::Known(ClientMessage::Subscribe { page }) => {
            hub.subscribe(socket, page);
        }
        ClientFrame::Unknown(value) => {
            tracing::warn!(socket = %socket, frame = %value, "Unknown realtime message");
        }
    }
}

async fn writer_task(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
