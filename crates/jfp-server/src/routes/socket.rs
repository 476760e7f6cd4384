//! `/socket` WebSocket endpoint.
//!
//! Jellyfin clients open this to receive server-pushed events and to keep
//! the session alive. The proxy doesn't originate any real server events
//! (those live on the backends); it answers keep-alive pings so clients
//! don't treat the proxy connection as dead.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

use crate::context::AppContext;

pub async fn upgrade(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(mut socket: WebSocket, _ctx: AppContext) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) if text.contains("KeepAlive") => {
                if socket.send(Message::Text("KeepAlive".into())).await.is_err() {
                    break;
                }
            }
            Message::Ping(payload) => {
                if socket.send(Message::Pong(payload)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
