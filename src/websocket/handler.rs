use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::RelayError;
use crate::metrics::ConnectionMetrics;
use crate::relay::{RelayDispatcher, RelayEvent};
use crate::server::AppState;

use super::message::{ClientFrame, OutboundMessage};

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
#[tracing::instrument(name = "ws.connection", skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_start = std::time::Instant::now();
    let buffer_size = state.settings.websocket.outbound_buffer_size.max(1);

    // Outbound queue drained by the writer task below
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(buffer_size);
    let connection_id = state.registry.register(tx).id;

    ConnectionMetrics::record_opened();
    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &dispatcher, connection_id).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
            // An in-flight event must finish before membership is cleared
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
            let _ = send_task.await;
        }
    }

    state
        .dispatcher
        .handle_event(connection_id, RelayEvent::Disconnect)
        .await;

    let duration = connection_start.elapsed().as_secs_f64();
    ConnectionMetrics::record_closed(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

/// Process a received WebSocket frame.
/// Returns false if the connection should be closed.
async fn process_message(msg: Message, dispatcher: &RelayDispatcher, connection_id: Uuid) -> bool {
    match msg {
        Message::Text(text) => {
            match ClientFrame::parse(text.as_str()) {
                Ok(event) => dispatcher.handle_event(connection_id, event).await,
                Err(e) => dispatcher.reject(connection_id, &e),
            }
            true
        }
        Message::Binary(_) => {
            dispatcher.reject(
                connection_id,
                &RelayError::MalformedEvent("binary frames are not supported".to_string()),
            );
            true
        }
        // Pong replies are sent by axum
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Received close frame");
            false
        }
    }
}
