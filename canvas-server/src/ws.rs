//! `GET /sub?cx&cy` — the WebSocket half of §6. One subscriber per
//! connection; deltas are pushed as they're published, a ping keeps the
//! connection alive, and any inbound client data just resets the idle
//! timer (the spec gives client-to-server frames no other meaning).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use bytes::Bytes;
use canvas_engine::Delta;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubQuery {
    cx: Option<i64>,
    cy: Option<i64>,
}

#[derive(Serialize)]
struct DeltaFrame {
    seq: u64,
    o: u32,
    color: u8,
    ts: i64,
}

impl From<Delta> for DeltaFrame {
    fn from(d: Delta) -> Self {
        Self {
            seq: d.seq,
            o: d.o,
            color: d.color,
            ts: d.ts,
        }
    }
}

pub async fn sub_handler(State(state): State<Arc<AppState>>, Query(q): Query<SubQuery>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let (Some(cx), Some(cy)) = (q.cx, q.cy) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    let ws = ws.write_buffer_size(state.config.ws_write_buffer_bytes);
    ws.on_upgrade(move |socket| handle_socket(socket, state, cx, cy))
}

/// Idle-read timeout: the connection is closed if no client frame and no
/// ping response arrives within this window.
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, cx: i64, cy: i64) {
    let (handle, mut rx) = state.hub.subscribe(cx, cy);
    let ping_interval = Duration::from_secs(state.config.ws_ping_interval_secs);
    let mut ping_timer = time::interval(ping_interval);
    ping_timer.tick().await; // first tick fires immediately; discard it

    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            biased;

            delta = rx.recv() => {
                let Some(delta) = delta else {
                    break;
                };
                let frame = DeltaFrame::from(delta);
                let text = serde_json::to_string(&frame).unwrap_or_default();
                if socket.send(Message::Text(Utf8Bytes::from(text))).await.is_err() {
                    break;
                }
            }

            _ = ping_timer.tick() => {
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => {
                        last_activity = Instant::now();
                    }
                    Some(Err(_)) | None => break,
                }
            }

            _ = time::sleep_until(last_activity + IDLE_TIMEOUT) => {
                tracing::debug!(cx, cy, "subscriber idle timeout");
                break;
            }
        }
    }

    state.hub.unsubscribe(&handle);
}
