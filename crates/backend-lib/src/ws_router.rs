// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! WebSocket endpoint and per-connection pump for the room relay.
use crate::auth::Identity;
use crate::error::AppError;
use crate::metrics::{WS_ACTIVE, WS_CONNECTION, WS_DISCONNECTION};
use crate::relay::{ConnectionId, Inbox, RelayError, RoomRelay};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;

/// Routes serving the relay at `path`
pub fn routes(path: &str) -> Router<Arc<AppState>> {
    Router::new().route(path, get(ws_handler))
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Response {
    if state.settings.relay.require_session && !identity.is_authenticated() {
        return AppError::AuthDenied("Authentication required".to_string()).into_response();
    }

    if !state.relay.is_running() {
        return AppError::Internal("relay is stopped".to_string()).into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(socket, state, identity))
}

/// Register with the relay; only accepted connections are counted
fn open_connection(relay: &RoomRelay, label: String) -> Result<(ConnectionId, Inbox), RelayError> {
    let connection = relay.connect(label)?;
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);
    Ok(connection)
}

fn close_connection(relay: &RoomRelay, connection_id: ConnectionId) {
    let rooms = relay.disconnect(connection_id);
    tracing::debug!(%connection_id, rooms, "websocket closed");

    counter!(WS_DISCONNECTION).increment(1);
    gauge!(WS_ACTIVE).decrement(1.0);
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let label = identity
        .principal()
        .map_or_else(|| "anonymous".to_string(), |p| p.user_id.clone());

    let (connection_id, mut inbox) = match open_connection(&state.relay, label) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting websocket connection");
            return;
        },
    };

    let (mut tx, mut rx) = socket.split();

    // Forward relayed events to the socket in arrival order
    let send_task = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize relay event");
                    continue;
                },
            };
            if tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        // Inbox closed: the relay dropped this connection
        let _ = tx.close().await;
    });

    while let Some(message) = rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                match state.relay.handle_frame(connection_id, text.as_str()) {
                    Ok(outcome) => tracing::trace!(%connection_id, ?outcome, "relay frame handled"),
                    Err(RelayError::Stopped) => break,
                    // Logged by the relay; the connection stays open
                    Err(_) => {},
                }
            },
            Ok(Message::Binary(_)) => {
                tracing::debug!(%connection_id, "ignoring binary frame");
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "websocket receive error");
                break;
            },
        }
    }

    close_connection(&state.relay, connection_id);
    send_task.abort();
}
