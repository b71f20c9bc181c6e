use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::state::AppState;
use crate::types::ServerMsg;

/// Fan-out of grading and standings events to every open socket.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<ServerMsg>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Nobody listening is not an error.
    pub fn publish(&self, msg: ServerMsg) {
        let _ = self.tx.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.tx.subscribe()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let events = state.live.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<ServerMsg>) {
    let (mut sender, mut receiver) = socket.split();

    let socket_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("WebSocket connected: {}", socket_id);

    let forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    let Ok(json) = serde_json::to_string(&msg) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Socket lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    // The stream is push-only; incoming frames just keep the socket alive.
    while let Some(Ok(msg)) = receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    tracing::info!("WebSocket disconnected: {}", socket_id);
    forward.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = Hub::new();
        let mut rx = hub.subscribe();
        hub.publish(ServerMsg::PropGraded {
            prop_id: "p1".into(),
            answer: "yes".into(),
        });

        let msg = rx.recv().await.unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PropGraded");
        assert_eq!(json["propId"], "p1");
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        Hub::new().publish(ServerMsg::GameGraded {
            game_id: "g1".into(),
            winner: None,
        });
    }
}
