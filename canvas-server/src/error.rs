//! Maps `canvas_engine::PaintError` to HTTP status + JSON body at the
//! transport boundary. `canvas-engine` itself never knows about status
//! codes — see spec.md §7.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canvas_engine::PaintError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    reason: Option<&'static str>,
}

pub struct ApiError(pub PaintError);

impl From<PaintError> for ApiError {
    fn from(err: PaintError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, reason) = match self.0 {
            PaintError::BadInput(msg) => (StatusCode::BAD_REQUEST, "bad_input", Some(msg)),
            PaintError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            PaintError::Forbidden(reason) => (StatusCode::FORBIDDEN, "forbidden", Some(reason.as_str())),
            PaintError::TooMany => (StatusCode::TOO_MANY_REQUESTS, "cooldown", None),
            PaintError::StoreUnavailable => (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", None),
            PaintError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        };

        (status, Json(ErrorBody { error, reason })).into_response()
    }
}
