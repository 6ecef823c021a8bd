//! Error taxonomy shared by the Admission Guard and Chunk Store.
//!
//! This is a taxonomy, not a 1:1 mirror of transport status codes — the
//! `canvas-server` boundary maps each variant to an HTTP status; nothing in
//! `canvas-engine` knows about HTTP.

use thiserror::Error;

/// Why a paint was rejected by the Admission Guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Geofence,
    Radius,
    Speed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Geofence => "geofence",
            RejectReason::Radius => "radius",
            RejectReason::Speed => "speed",
        }
    }
}

/// Errors a paint attempt can fail with, in the order the Admission Guard's
/// rule chain can produce them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PaintError {
    #[error("bad input: {0}")]
    BadInput(&'static str),

    #[error("bot token missing or rejected")]
    Unauthorized,

    #[error("forbidden: {0:?}")]
    Forbidden(RejectReason),

    #[error("rate limited: cooldown active")]
    TooMany,

    #[error("state store unavailable")]
    StoreUnavailable,

    #[error("internal error")]
    Internal,
}
