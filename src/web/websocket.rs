//! WebSocket feed of command results.

use super::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

/// WebSocket upgrade handler.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(slot) = ClientSlot::claim(&state.ws_clients, state.max_ws_clients) else {
        warn!("Refusing WebSocket client: {} already connected", state.max_ws_clients);
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };
    // The slot travels with the callback, so a failed upgrade releases it too.
    ws.on_upgrade(move |socket| handle_websocket(socket, state, slot))
}

/// One claimed connection slot, released on drop.
struct ClientSlot(Arc<AtomicUsize>);

impl ClientSlot {
    fn claim(clients: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(clients)))
    }
}

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Forward every command event to one client until it disconnects.
async fn handle_websocket(socket: WebSocket, state: AppState, _slot: ClientSlot) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket client connected: {}", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.events.subscribe());

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize command event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    warn!("WebSocket client {} lagged by {} events", client_id, n);
                }
                None => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket error from {}: {}", client_id, e);
                    break;
                }
            },
        }
    }

    info!("WebSocket client {} disconnected", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_capped_and_released_on_drop() {
        let clients = Arc::new(AtomicUsize::new(0));
        let first = ClientSlot::claim(&clients, 2).expect("first slot");
        let second = ClientSlot::claim(&clients, 2).expect("second slot");
        assert!(ClientSlot::claim(&clients, 2).is_none());
        assert_eq!(clients.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(clients.load(Ordering::SeqCst), 1);
        let third = ClientSlot::claim(&clients, 2);
        assert!(third.is_some());

        drop(second);
        drop(third);
        assert_eq!(clients.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unused_slot_released() {
        let clients = Arc::new(AtomicUsize::new(0));
        // A callback that never runs still drops its captured slot.
        let callback = {
            let slot = ClientSlot::claim(&clients, 1).expect("slot");
            move || drop(slot)
        };
        assert_eq!(clients.load(Ordering::SeqCst), 1);
        std::mem::drop(callback);
        assert_eq!(clients.load(Ordering::SeqCst), 0);
    }
}
