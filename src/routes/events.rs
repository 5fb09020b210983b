use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::notify::ChangeBroadcaster;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| client_loop(socket, state.notifier.clone()))
}

/// Forward change signals to one connected client until it goes away.
async fn client_loop(socket: WebSocket, notifier: ChangeBroadcaster) {
    let mut events = notifier.subscribe();
    let (mut outbound, mut inbound) = socket.split();
    tracing::debug!("realtime client connected ({} active)", notifier.client_count());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(name) => {
                    if outbound.send(Message::Text(name.into())).await.is_err() {
                        break;
                    }
                }
                // A lagging client only misses intermediate signals; the
                // next one triggers the same full re-fetch.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            message = inbound.next() => match message {
                // Clients have nothing to say on this channel; frames are
                // drained so close handshakes and pings work.
                Some(Ok(_)) => continue,
                _ => break,
            },
        }
    }

    tracing::debug!("realtime client disconnected");
}
