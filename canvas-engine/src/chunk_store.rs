//! Component C — Chunk Store.
//!
//! Holds a mapping from chunk coordinate to a 32,768-byte buffer plus a
//! monotonic per-chunk sequence number. Each chunk's bytes and `seq` are
//! mutated only under that chunk's own guard, so contention on one hot
//! chunk never serializes writes to an unrelated one — the same principle
//! the teacher's canvas applies with a single process-wide seqlock, scaled
//! down to per-chunk granularity here because the store is sharded across
//! many more independent regions than a single bare-metal canvas.

use std::sync::Mutex;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use crate::codec::{self, CHUNK_BYTES};
use crate::time::Clock;

/// Coordinate of a 256x256-tile chunk.
pub type ChunkKey = (i64, i64);

struct ChunkCell {
    bytes: [u8; CHUNK_BYTES],
    seq: u64,
}

impl ChunkCell {
    fn empty() -> Self {
        Self {
            bytes: [0u8; CHUNK_BYTES],
            seq: 0,
        }
    }
}

/// The result of an accepted [`ChunkStore::paint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintResult {
    pub new_seq: u64,
    pub ts: i64,
    pub prev_color: u8,
}

/// Concurrent, chunk-sharded canvas storage.
pub struct ChunkStore {
    chunks: DashMap<ChunkKey, Mutex<ChunkCell>, FxBuildHasher>,
    clock: Clock,
}

impl Default for ChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: DashMap::with_hasher(FxBuildHasher::default()),
            clock: Clock::system(),
        }
    }

    /// Builds a store with an injectable clock, for deterministic tests.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            chunks: DashMap::with_hasher(FxBuildHasher::default()),
            clock,
        }
    }

    /// Reads a consistent `(bytes, seq)` snapshot of chunk `(cx, cy)`.
    ///
    /// A chunk that was never written returns an all-zero buffer and
    /// `seq = 0` rather than an error.
    pub fn read(&self, cx: i64, cy: i64) -> (Box<[u8; CHUNK_BYTES]>, u64) {
        match self.chunks.get(&(cx, cy)) {
            Some(entry) => {
                let cell = entry.lock().unwrap();
                (Box::new(cell.bytes), cell.seq)
            }
            None => (Box::new([0u8; CHUNK_BYTES]), 0),
        }
    }

    /// Current sequence of chunk `(cx, cy)`, 0 if the chunk is absent.
    pub fn seq_of(&self, cx: i64, cy: i64) -> u64 {
        match self.chunks.get(&(cx, cy)) {
            Some(entry) => entry.lock().unwrap().seq,
            None => 0,
        }
    }

    /// Atomically writes `color` at offset `o` of chunk `(cx, cy)`.
    ///
    /// The read-prev / write-nibble / bump-seq / capture-ts sequence happens
    /// as one indivisible step relative to every other writer and reader of
    /// this chunk; `o` and `color` are expected to already be validated by
    /// the caller (the Admission Guard).
    pub fn paint(&self, cx: i64, cy: i64, o: u32, color: u8) -> PaintResult {
        let entry = self
            .chunks
            .entry((cx, cy))
            .or_insert_with(|| Mutex::new(ChunkCell::empty()));
        let mut cell = entry.lock().unwrap();

        let prev_color = codec::set(&mut cell.bytes, o, color);
        cell.seq += 1;
        let ts = self.clock.now_unix_secs();

        PaintResult {
            new_seq: cell.seq,
            ts,
            prev_color,
        }
    }
}
