//! WebSocket tests: subscriptions and seat-change broadcasts.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use enrollment_gateway::app_state::AppState;
use enrollment_gateway::build_app;
use enrollment_gateway::config::GatewayConfig;
use enrollment_gateway::domain::SystemClock;
use enrollment_gateway::persistence::MemoryStore;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> SocketAddr {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock),
        &GatewayConfig::default(),
    );
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, build_app(state)).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let Ok((socket, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws handshake failed");
    };
    socket
}

fn command(id: &str, payload: Value) -> Message {
    let envelope = json!({
        "id": id,
        "type": "command",
        "timestamp": "2024-05-01T08:00:00Z",
        "payload": payload,
    });
    Message::text(envelope.to_string())
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_secs(5), socket.next()).await
        else {
            panic!("no message within timeout");
        };
        if let Message::Text(text) = msg {
            let Ok(value) = serde_json::from_str::<Value>(text.as_str()) else {
                panic!("server sent invalid JSON");
            };
            return value;
        }
    }
}

#[tokio::test]
async fn wildcard_subscriber_sees_seat_changes() {
    let addr = spawn_server().await;
    let mut socket = connect(addr).await;

    let Ok(()) = socket
        .send(command("c1", json!({ "command": "subscribe", "event_ids": ["*"] })))
        .await
    else {
        panic!("send failed");
    };
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["id"], "c1");
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["payload"]["wildcard"], true);

    let client = reqwest::Client::new();
    let Ok(resp) = client
        .post(format!("http://{addr}/api/v1/events"))
        .header("x-user-id", "admin-1")
        .json(&json!({
            "name": "Chess Club",
            "visibility": "public",
            "sessions": [
                { "date": "2024-05-10", "start_time": "15:00", "end_time": "16:00", "capacity": 8 }
            ]
        }))
        .send()
        .await
    else {
        panic!("request failed");
    };
    let Ok(event) = resp.json::<Value>().await else {
        panic!("invalid event JSON");
    };
    let (Some(event_id), Some(session_id)) =
        (event["id"].as_str(), event["sessions"][0]["id"].as_str())
    else {
        panic!("event JSON missing ids");
    };

    let created = next_json(&mut socket).await;
    assert_eq!(created["type"], "event");
    assert_eq!(created["payload"]["event_type"], "event_created");
    assert_eq!(created["payload"]["event_id"], event_id);

    let Ok(resp) = client
        .post(format!("http://{addr}/api/v1/enrollments"))
        .header("x-user-id", "U")
        .json(&json!({ "event_id": event_id, "session_id": session_id }))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

    let seats = next_json(&mut socket).await;
    assert_eq!(seats["payload"]["event_type"], "seats_changed");
    assert_eq!(seats["payload"]["session_id"], session_id);
    assert_eq!(seats["payload"]["filled"], 1);
    assert_eq!(seats["payload"]["capacity"], 8);

    let confirmed = next_json(&mut socket).await;
    assert_eq!(confirmed["payload"]["event_type"], "enrollment_confirmed");
}

#[tokio::test]
async fn get_event_command_reports_unknown_and_invalid_ids() {
    let addr = spawn_server().await;
    let mut socket = connect(addr).await;

    let missing = uuid::Uuid::new_v4().to_string();
    let Ok(()) = socket
        .send(command("g1", json!({ "command": "get_event", "event_id": missing })))
        .await
    else {
        panic!("send failed");
    };
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["id"], "g1");
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["payload"]["code"], 404);

    let Ok(()) = socket
        .send(command("g2", json!({ "command": "get_event", "event_id": "nope" })))
        .await
    else {
        panic!("send failed");
    };
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["payload"]["code"], 400);

    let Ok(()) = socket.send(Message::text("{not json")).await else {
        panic!("send failed");
    };
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
}
