use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::log_sink::LogEntry;

use super::state::{DashboardState, LogLine};

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DashboardState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Pushes every new log entry to a single client as JSON.
async fn handle_socket(socket: WebSocket, state: Arc<DashboardState>) {
    let (sender, mut receiver) = socket.split();
    let entry_rx = state.runner.sink().subscribe();

    let mut send_task = tokio::spawn(forward_entries(entry_rx, sender));

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => { recv_task.abort(); },
        _ = &mut recv_task => { send_task.abort(); },
    }
}

/// Forward log entries to `sender` as JSON `LogLine`s until either side
/// closes.
async fn forward_entries<S>(mut entry_rx: broadcast::Receiver<LogEntry>, mut sender: S)
where
    S: Sink<Message> + Unpin,
{
    loop {
        let entry = match entry_rx.recv().await {
            Ok(entry) => entry,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("websocket client lagged, skipped {skipped} log entries");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Ok(json) = serde_json::to_string(&LogLine::from(&entry)) else {
            continue;
        };
        if sender.send(Message::Text(json)).await.is_err() {
            break; // client disconnected
        }
    }
}
