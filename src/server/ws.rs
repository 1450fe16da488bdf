//! WebSocket handler for data-change notifications.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::server::state::AppState;
use crate::store::EventStore;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Send a store summary on connection
    if let Some(initial_state) = get_current_state(&state) {
        let _ = sender.send(Message::Text(initial_state)).await;
    }

    // Subscribe to broadcast channel
    let mut rx = state.subscribe();

    // Spawn task to receive from broadcast and send to WebSocket
    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Drain incoming messages until the client closes
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::debug!("WebSocket connection closed");
}

/// Builds the initial message: event and computer counts.
fn get_current_state(state: &AppState) -> Option<String> {
    let events = state.db.event_count().ok()?;
    let computers = state.db.all_computers().ok()?.len();

    let message = serde_json::json!({
        "type": "initial_state",
        "data": {
            "events": events,
            "computers": computers,
            "logoff_pairing": state.config.logoff_pairing,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    serde_json::to_string(&message).ok()
}
