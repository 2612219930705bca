//! Notification push over WebSocket.
//!
//! The upgrade request carries the session cookie. The client then sends
//! `{"type":"auth"}` and gets `auth_ok` or `auth_error`; after `auth_ok`
//! every notification stored for that user is pushed as it is created.
//! A socket that falls behind skips what it missed; the REST poll covers
//! the gap.

use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use tasfiya_core::UserId;

use crate::middleware::OptionalAuth;
use crate::models::{CurrentUser, Notification};
use crate::services::notifications::is_for;
use crate::state::AppState;

/// How long a socket may stay silent before sending `auth`.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Auth,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    AuthOk {
        #[serde(rename = "userId")]
        user_id: UserId,
    },
    AuthError,
    Notification {
        notification: &'a Notification,
    },
}

/// GET /ws
pub async fn upgrade(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

async fn send(socket: &mut WebSocket, message: &ServerMessage<'_>) -> bool {
    let Ok(text) = serde_json::to_string(message) else {
        return false;
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

/// Wait for the client's `auth` message. Anything else fails the handshake.
async fn await_auth(socket: &mut WebSocket) -> bool {
    match tokio::time::timeout(AUTH_TIMEOUT, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            matches!(serde_json::from_str(&text), Ok(ClientMessage::Auth))
        }
        _ => false,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, user: Option<CurrentUser>) {
    // Subscribe before replying so nothing created after auth_ok is missed.
    let mut rx = state.hub().subscribe();

    let user = match (await_auth(&mut socket).await, user) {
        (true, Some(user)) => user,
        _ => {
            send(&mut socket, &ServerMessage::AuthError).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    if !send(&mut socket, &ServerMessage::AuthOk { user_id: user.id }).await {
        return;
    }
    tracing::debug!(user_id = %user.id, "Notification socket authenticated");

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(notification) if is_for(&notification, user.id) => {
                    let message = ServerMessage::Notification { notification: &notification };
                    if !send(&mut socket, &message).await {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(user_id = %user.id, skipped, "Notification socket lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(user_id = %user.id, "Notification socket closed");
}
