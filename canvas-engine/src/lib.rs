//! The canvas state engine: bit-packed chunked canvas storage, the
//! admission pipeline that guards every write, and the per-chunk
//! subscription hub that fans deltas out to interested readers.
//!
//! This crate is the hard part spec.md calls out — it owns no network
//! transport of its own; `canvas-server` wires it to HTTP/WebSocket.

pub mod chunk_store;
pub mod codec;
pub mod error;
pub mod guard;
pub mod hub;
pub mod mask;
pub mod projection;
pub mod time;
pub mod token;

pub use chunk_store::{ChunkStore, PaintResult};
pub use codec::{CHUNK_BYTES, CHUNK_CELLS, CHUNK_EDGE};
pub use error::{PaintError, RejectReason};
pub use guard::{AdmissionGuard, ClientId, GuardConfig, PaintRequest};
pub use hub::{Delta, SubscriberHandle, SubscriptionHub, DEFAULT_OUTBOX_CAPACITY};
pub use mask::{BitmapMask, BoundingBoxMask, GeofenceMask, MaskHeader};
pub use time::Clock;
pub use token::{AlwaysAllowVerifier, AlwaysDenyVerifier, HttpTokenVerifier, TokenVerifier, VerifyOutcome};
