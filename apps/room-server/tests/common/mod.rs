#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use room_server::config::Config;
use room_server::AppState;

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for any single frame before giving up.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Config with timeouts short enough to exercise from a test.
pub fn test_config() -> Config {
    Config {
        port: 0,
        default_room: "lobby".to_string(),
        outbound_queue_capacity: 64,
        join_timeout: Duration::from_millis(500),
        ping_interval: Duration::from_secs(15),
        idle_timeout: Duration::from_secs(45),
    }
}

pub fn test_state() -> AppState {
    AppState::new(test_config())
}

/// Build the full application router wired to a fresh state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = room_server::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    start_ws_server_with(test_config()).await
}

/// Like [`start_ws_server`], with a caller-supplied config.
pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState) {
    let state = AppState::new(config);
    let app = room_server::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

pub async fn connect(addr: SocketAddr, room: &str) -> TestSocket {
    let url = format!("ws://{addr}/ws/{room}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

pub async fn send_json(ws: &mut TestSocket, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

pub async fn send_cursor(ws: &mut TestSocket, id: &str, x: f64, y: f64, volume: f64) {
    send_json(
        ws,
        serde_json::json!({ "id": id, "x": x, "y": y, "volume": volume }),
    )
    .await;
}

/// Read the next text frame as JSON, skipping pings.
pub async fn next_event(ws: &mut TestSocket) -> serde_json::Value {
    loop {
        let msg = time::timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("parse event");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Read frames until the server closes, returning the close code.
pub async fn expect_close(ws: &mut TestSocket) -> u16 {
    loop {
        let msg = time::timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Close(Some(frame)) => return u16::from(frame.code),
            tungstenite::Message::Close(None) => panic!("close frame without a code"),
            _ => continue,
        }
    }
}

/// Wait until `check` holds, polling the shared state.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
