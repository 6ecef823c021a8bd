//! `/state/chunk`, `/paint`, `/healthz` — the plain-HTTP half of §6.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use canvas_engine::PaintRequest;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChunkQuery {
    cx: Option<i64>,
    cy: Option<i64>,
}

pub async fn get_chunk(State(state): State<Arc<AppState>>, Query(q): Query<ChunkQuery>) -> Response {
    let (Some(cx), Some(cy)) = (q.cx, q.cy) else {
        return (StatusCode::BAD_REQUEST, "missing cx/cy").into_response();
    };

    let (bytes, seq) = state.store.read(cx, cy);
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CACHE_CONTROL, "public, max-age=2, stale-while-revalidate=8".to_string()),
            (HeaderName::from_static("x-seq"), seq.to_string()),
        ],
        bytes.to_vec(),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct PaintBody {
    lat: f64,
    lon: f64,
    cx: i64,
    cy: i64,
    o: u32,
    color: u8,
    #[serde(rename = "turnstileToken")]
    turnstile_token: Option<String>,
}

#[derive(Serialize)]
pub struct PaintResponse {
    ok: bool,
    seq: u64,
    ts: i64,
}

pub async fn post_paint(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<PaintBody>,
) -> Result<Json<PaintResponse>, ApiError> {
    let req = PaintRequest {
        lat: body.lat,
        lon: body.lon,
        cx: body.cx,
        cy: body.cy,
        o: body.o,
        color: body.color,
    };
    let client_id = addr.ip().to_string();

    state
        .guard
        .admit(&req, &client_id, addr.ip(), body.turnstile_token.as_deref())
        .await?;

    let result = state.store.paint(body.cx, body.cy, body.o, body.color);
    state.hub.publish(
        body.cx,
        body.cy,
        canvas_engine::Delta {
            seq: result.new_seq,
            o: body.o,
            color: body.color,
            ts: result.ts,
        },
    );

    Ok(Json(PaintResponse {
        ok: true,
        seq: result.new_seq,
        ts: result.ts,
    }))
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
