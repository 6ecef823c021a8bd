//! Exercises `/sub` over a real TCP socket: spec.md §8 scenario 7 (subscribe
//! fan-out) end to end, through the actual WS upgrade route and the real
//! `DeltaFrame` JSON wire format — not just `canvas-engine::hub`'s in-process
//! channel tests.

use std::net::SocketAddr;
use std::time::Duration;

use canvas_server::build_app;
use canvas_server::config::ServerConfig;
use canvas_server::state::AppState;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

fn test_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        state_store_url: None,
        mask_path: None,
        paint_cooldown_secs: 5,
        geofence_radius_m: 300.0,
        speed_max_kmh: 150.0,
        enable_token_check: false,
        token_secret: String::new(),
        ws_write_buffer_bytes: 1024,
        ws_ping_interval_secs: 20,
    }
}

/// Binds the real router to an ephemeral port and serves it in the
/// background, returning the address clients should connect to.
async fn spawn_server() -> SocketAddr {
    let state = AppState::build(test_config()).unwrap();
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    addr
}

#[tokio::test]
async fn subscriber_receives_matching_delta_frame_over_the_wire() {
    let addr = spawn_server().await;

    let ws_url = format!("ws://{addr}/sub?cx=0&cy=0");
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();

    // Give the upgrade a moment to register the subscriber before painting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let paint_body = serde_json::json!({
        "lat": 42.3551,
        "lon": -71.0657,
        "cx": 0,
        "cy": 0,
        "o": 42,
        "color": 4,
        "turnstileToken": null,
    });
    let http = reqwest::Client::new();
    let resp = http
        .post(format!("http://{addr}/paint"))
        .json(&paint_body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let paint_json: Value = resp.json().await.unwrap();
    let expected_seq = paint_json["seq"].as_u64().unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("delta frame did not arrive within timeout")
        .expect("websocket closed before delivering a frame")
        .unwrap();

    let WsMessage::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let delta: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(delta["seq"], expected_seq);
    assert_eq!(delta["o"], 42);
    assert_eq!(delta["color"], 4);
    assert!(delta["ts"].is_i64());

    let _ = ws.send(WsMessage::Close(None)).await;
}

#[tokio::test]
async fn subscriber_to_a_different_chunk_does_not_see_the_delta() {
    let addr = spawn_server().await;

    let ws_url = format!("ws://{addr}/sub?cx=9&cy=9");
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let paint_body = serde_json::json!({
        "lat": 42.3551,
        "lon": -71.0657,
        "cx": 0,
        "cy": 0,
        "o": 1,
        "color": 2,
        "turnstileToken": null,
    });
    let http = reqwest::Client::new();
    let resp = http
        .post(format!("http://{addr}/paint"))
        .json(&paint_body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let outcome = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(outcome.is_err(), "subscriber to an unrelated chunk should not receive a frame");

    let _ = ws.send(WsMessage::Close(None)).await;
}
