//! REST API tests against a live server on an ephemeral port.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use enrollment_gateway::app_state::AppState;
use enrollment_gateway::build_app;
use enrollment_gateway::config::GatewayConfig;
use enrollment_gateway::domain::FixedClock;
use enrollment_gateway::persistence::MemoryStore;

async fn spawn_server() -> SocketAddr {
    let Some(now) = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).single() else {
        panic!("valid timestamp");
    };
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(FixedClock::new(now)),
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

async fn json_body(resp: reqwest::Response) -> Value {
    let Ok(body) = resp.json::<Value>().await else {
        panic!("response was not JSON");
    };
    body
}

fn workshop(name: &str, start: &str, end: &str, capacity: u32) -> Value {
    json!({
        "name": name,
        "location": "Room 4",
        "visibility": "public",
        "sessions": [
            { "date": "2024-05-10", "start_time": start, "end_time": end, "capacity": capacity }
        ]
    })
}

async fn create_event(client: &reqwest::Client, base: &str, body: &Value) -> (String, String) {
    let Ok(resp) = client
        .post(format!("{base}/api/v1/events"))
        .header("x-user-id", "admin-1")
        .json(body)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::CREATED);
    let event = json_body(resp).await;
    let (Some(id), Some(session)) = (
        event["id"].as_str(),
        event["sessions"][0]["id"].as_str(),
    ) else {
        panic!("event JSON missing ids: {event}");
    };
    (id.to_string(), session.to_string())
}

#[tokio::test]
async fn health_reports_version() {
    let addr = spawn_server().await;
    let Ok(resp) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn enrollment_round_trip_over_http() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let (event_id, session_id) =
        create_event(&client, &base, &workshop("Pottery", "10:00", "11:00", 1)).await;
    let enroll = json!({ "event_id": event_id, "session_id": session_id });

    let Ok(resp) = client
        .post(format!("{base}/api/v1/enrollments"))
        .header("x-user-id", "U")
        .json(&enroll)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::CREATED);
    let enrollment = json_body(resp).await;
    assert_eq!(enrollment["id"], format!("U_{event_id}"));
    assert_eq!(enrollment["status"], "confirmed");

    let Ok(resp) = client
        .post(format!("{base}/api/v1/enrollments"))
        .header("x-user-id", "V")
        .json(&enroll)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let error = json_body(resp).await;
    assert_eq!(error["error"]["code"], 4003);

    let Ok(resp) = client
        .get(format!("{base}/api/v1/events/{event_id}"))
        .send()
        .await
    else {
        panic!("request failed");
    };
    let event = json_body(resp).await;
    assert_eq!(event["sessions"][0]["filled"], 1);

    let Ok(resp) = client
        .delete(format!("{base}/api/v1/me/enrollments/{event_id}"))
        .header("x-user-id", "U")
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["canceled"], true);

    let Ok(resp) = client
        .get(format!("{base}/api/v1/me/enrollments"))
        .header("x-user-id", "U")
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(json_body(resp).await, json!([]));
}

#[tokio::test]
async fn overlapping_enrollment_is_a_conflict() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    let (x, xs) = create_event(&client, &base, &workshop("Event X", "09:00", "10:30", 5)).await;
    let (y, ys) = create_event(&client, &base, &workshop("Event Y", "10:00", "11:00", 5)).await;

    for (event_id, session_id, expected) in [
        (&x, &xs, StatusCode::CREATED),
        (&y, &ys, StatusCode::CONFLICT),
    ] {
        let Ok(resp) = client
            .post(format!("{base}/api/v1/enrollments"))
            .header("x-user-id", "U")
            .json(&json!({ "event_id": event_id, "session_id": session_id }))
            .send()
            .await
        else {
            panic!("request failed");
        };
        assert_eq!(resp.status(), expected);
        if expected == StatusCode::CONFLICT {
            let error = json_body(resp).await;
            assert_eq!(error["error"]["code"], 4002);
            let Some(message) = error["error"]["message"].as_str() else {
                panic!("missing message");
            };
            assert!(message.contains("Event X"));
            assert!(message.contains("09:00 - 10:30"));
        }
    }
}

#[tokio::test]
async fn caller_header_is_required() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let Ok(resp) = client
        .post(format!("http://{addr}/api/v1/events"))
        .json(&workshop("Anonymous", "10:00", "11:00", 3))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["error"]["code"], 1004);
}

#[tokio::test]
async fn event_list_pages_with_cursor() {
    let addr = spawn_server().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();
    for name in ["A", "B", "C"] {
        create_event(&client, &base, &workshop(name, "10:00", "11:00", 3)).await;
    }

    let Ok(resp) = client
        .get(format!("{base}/api/v1/events?limit=2"))
        .send()
        .await
    else {
        panic!("request failed");
    };
    let first = json_body(resp).await;
    assert_eq!(first["data"].as_array().map(Vec::len), Some(2));
    let Some(cursor) = first["next_cursor"].as_str() else {
        panic!("expected a cursor: {first}");
    };

    let Ok(resp) = client
        .get(format!("{base}/api/v1/events?limit=2&cursor={cursor}"))
        .send()
        .await
    else {
        panic!("request failed");
    };
    let second = json_body(resp).await;
    assert_eq!(second["data"].as_array().map(Vec::len), Some(1));
    assert!(second["next_cursor"].is_null());

    let Ok(resp) = client
        .get(format!("{base}/api/v1/events?cursor=not-a-cursor"))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generator_appends_to_staged_sessions() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let body = json!({
        "start_date": "2024-03-01",
        "end_date": "2024-03-31",
        "start_time": "18:00",
        "end_time": "19:30",
        "capacity": 12,
        "weekdays": [1],
        "staged": [
            { "date": "2024-02-26", "start_time": "18:00", "end_time": "19:30", "capacity": 12 }
        ]
    });
    let Ok(resp) = client
        .post(format!("http://{addr}/api/v1/events/sessions/generate"))
        .json(&body)
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(resp.status(), StatusCode::OK);
    let generated = json_body(resp).await;
    assert_eq!(generated["added"], 4);
    assert_eq!(generated["sessions"].as_array().map(Vec::len), Some(5));
}
