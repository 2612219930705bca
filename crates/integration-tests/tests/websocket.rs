//! Notification push over a real socket.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use tasfiya_core::{NotificationKind, UserId};
use tasfiya_integration_tests::TestApp;
use tasfiya_server::models::NewNotification;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn connect(addr: SocketAddr, cookie: Option<&str>) -> Socket {
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    if let Some(cookie) = cookie {
        request
            .headers_mut()
            .insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    let (socket, _) = connect_async(request).await.unwrap();
    socket
}

async fn send_auth(socket: &mut Socket) {
    socket
        .send(Message::text(json!({"type": "auth"}).to_string()))
        .await
        .unwrap();
}

/// Next text frame as JSON, skipping pings.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_anonymous_socket_gets_auth_error_and_close() {
    let app = TestApp::new();
    let addr = app.listen().await;
    let mut socket = connect(addr, None).await;

    send_auth(&mut socket).await;
    assert_eq!(next_json(&mut socket).await, json!({"type": "auth_error"}));

    let frame = tokio::time::timeout(WAIT, socket.next()).await.unwrap();
    assert!(
        matches!(frame, Some(Ok(Message::Close(_))) | None),
        "{frame:?}"
    );
}

#[tokio::test]
async fn test_logged_in_socket_receives_only_own_notifications() {
    let app = TestApp::new();
    let addr = app.listen().await;
    let mut alice = app.customer("Alice", "0501111111").await;
    let (status, me) = alice.get("/api/auth/me").await;
    assert_eq!(status, StatusCode::OK, "{me}");
    let alice_id = serde_json::from_value::<UserId>(me["id"].clone()).unwrap();
    let mut bob = app.customer("Bob", "0502222222").await;
    let (_, bob_me) = bob.get("/api/auth/me").await;
    let bob_id = serde_json::from_value::<UserId>(bob_me["id"].clone()).unwrap();

    let mut socket = connect(addr, alice.cookie()).await;
    send_auth(&mut socket).await;
    let ok = next_json(&mut socket).await;
    assert_eq!(ok["type"], "auth_ok");
    assert_eq!(ok["userId"], alice_id.as_i32());

    let notifier = app.state().notifier();
    notifier
        .notify(NewNotification::new(
            bob_id,
            NotificationKind::Outbid,
            "Outbid",
            "Someone bid higher",
        ))
        .await
        .unwrap();
    notifier
        .notify(NewNotification::new(
            alice_id,
            NotificationKind::AuctionWon,
            "You won",
            "Pay within 48 hours",
        ))
        .await
        .unwrap();

    // Bob's notification was published first, so the next push must be Alice's.
    let push = next_json(&mut socket).await;
    assert_eq!(push["type"], "notification");
    assert_eq!(push["notification"]["userId"], alice_id.as_i32());
    assert_eq!(push["notification"]["title"], "You won");

    notifier
        .notify(NewNotification::new(
            bob_id,
            NotificationKind::Outbid,
            "Outbid again",
            "Someone bid higher",
        ))
        .await
        .unwrap();
    let silent = tokio::time::timeout(Duration::from_millis(300), socket.next()).await;
    assert!(silent.is_err(), "unexpected frame: {silent:?}");
}
