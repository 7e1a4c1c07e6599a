//! WebSocket push channel.
//!
//! The first frame is the full `snapshot`; every later frame is a delta
//! committed after it. A subscriber that falls behind the broadcast buffer
//! gets a fresh `snapshot` in place of the dropped deltas.
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let subscription = state.open_subscription();
    let id = subscription.id;
    let mut updates = subscription.updates;

    if socket
        .send(Message::Text(subscription.initial.as_ref().to_owned()))
        .await
        .is_err()
    {
        state.close_subscription(id);
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            event = updates.recv() => {
                match event {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload.as_ref().to_owned())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(subscriber = %id, "Subscriber lagged by {} updates; resyncing", missed);
                        let (snapshot, fresh) = state.resync(id);
                        updates = fresh;
                        if socket.send(Message::Text(snapshot.as_ref().to_owned())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    state.close_subscription(id);
}
