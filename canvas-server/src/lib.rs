//! Library surface for `canvas-server`, split out of `main` so integration
//! tests can build the router directly without a real socket.

pub mod config;
pub mod error;
pub mod http;
pub mod state;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state/chunk", get(http::get_chunk))
        .route("/paint", post(http::post_paint))
        .route("/sub", get(ws::sub_handler))
        .route("/healthz", get(http::healthz))
        .with_state(state)
}
