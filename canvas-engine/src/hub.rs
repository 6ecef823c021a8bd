//! Component E — Subscription Hub.
//!
//! Per-chunk rooms of subscribers, each with a bounded outbox. `publish`
//! never blocks and never allocates unbounded memory: a full outbox tears
//! its subscriber down instead of stalling every other subscriber or the
//! paint critical path that triggered the publish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use tokio::sync::mpsc;

/// Recommended default outbox capacity per spec.md §4.5.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// A single broadcast-worthy change to one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub seq: u64,
    pub o: u32,
    pub color: u8,
    pub ts: i64,
}

type ChunkKey = (i64, i64);

/// A live subscription. Dropping this (or calling
/// [`SubscriptionHub::unsubscribe`] explicitly) removes the subscriber
/// from its room.
pub struct SubscriberHandle {
    id: u64,
    key: ChunkKey,
}

struct Room {
    subscribers: HashMap<u64, mpsc::Sender<Delta>>,
}

impl Room {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }
}

/// Per-chunk fan-out of paint deltas to subscribed readers.
pub struct SubscriptionHub {
    rooms: DashMap<ChunkKey, Mutex<Room>, FxBuildHasher>,
    next_id: AtomicU64,
    outbox_capacity: usize,
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}

impl SubscriptionHub {
    pub fn new(outbox_capacity: usize) -> Self {
        Self {
            rooms: DashMap::with_hasher(FxBuildHasher::default()),
            next_id: AtomicU64::new(1),
            outbox_capacity,
        }
    }

    /// Registers a new subscriber for chunk `(cx, cy)`, creating the room
    /// if this is its first subscriber. Returns a handle to unsubscribe
    /// with, and the receiving half of its outbox.
    pub fn subscribe(&self, cx: i64, cy: i64) -> (SubscriberHandle, mpsc::Receiver<Delta>) {
        let key = (cx, cy);
        let (tx, rx) = mpsc::channel(self.outbox_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let room = self.rooms.entry(key).or_insert_with(|| Mutex::new(Room::new()));
        room.lock().unwrap().subscribers.insert(id, tx);

        (SubscriberHandle { id, key }, rx)
    }

    /// Removes a subscriber. If its room is now empty, the room itself is
    /// destroyed so it stops being a no-op target for future publishes.
    pub fn unsubscribe(&self, handle: &SubscriberHandle) {
        self.remove_subscriber(handle.key, handle.id);
    }

    fn remove_subscriber(&self, key: ChunkKey, id: u64) {
        if let Some(room) = self.rooms.get(&key) {
            room.lock().unwrap().subscribers.remove(&id);
        }
        self.rooms
            .remove_if(&key, |_, room| room.lock().unwrap().subscribers.is_empty());
    }

    /// Publishes `delta` to every subscriber currently in chunk
    /// `(cx, cy)`'s room. A no-op if the room doesn't exist. Never blocks:
    /// a subscriber whose outbox is full is torn down instead.
    pub fn publish(&self, cx: i64, cy: i64, delta: Delta) {
        let key = (cx, cy);
        let Some(room) = self.rooms.get(&key) else {
            return;
        };

        let mut overflowed = Vec::new();
        {
            let mut room = room.lock().unwrap();
            for (&id, tx) in room.subscribers.iter() {
                if tx.try_send(delta).is_err() {
                    overflowed.push(id);
                }
            }
            for id in &overflowed {
                // Dropping the sender closes the channel; the subscriber's
                // reader task observes `recv() == None` and tears down.
                room.subscribers.remove(id);
            }
        }
        drop(room);

        if !overflowed.is_empty() {
            tracing::debug!(cx, cy, count = overflowed.len(), "tore down subscribers with full outboxes");
            self.rooms
                .remove_if(&key, |_, room| room.lock().unwrap().subscribers.is_empty());
        }
    }

    /// Number of live rooms. Exposed for tests asserting room lifecycle.
    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of subscribers currently in chunk `(cx, cy)`'s room, 0 if
    /// the room doesn't exist.
    pub fn subscriber_count(&self, cx: i64, cy: i64) -> usize {
        self.rooms
            .get(&(cx, cy))
            .map(|room| room.lock().unwrap().subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(seq: u64) -> Delta {
        Delta {
            seq,
            o: 42,
            color: 4,
            ts: 1_000,
        }
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_a_no_op() {
        let hub = SubscriptionHub::default();
        hub.publish(0, 0, delta(1));
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_deltas_in_order() {
        let hub = SubscriptionHub::default();
        let (_handle, mut rx) = hub.subscribe(0, 0);

        hub.publish(0, 0, delta(1));
        hub.publish(0, 0, delta(2));
        hub.publish(0, 0, delta(3));

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
        assert_eq!(rx.recv().await.unwrap().seq, 3);
    }

    #[tokio::test]
    async fn publish_only_reaches_subscribers_of_that_chunk() {
        let hub = SubscriptionHub::default();
        let (_h0, mut rx0) = hub.subscribe(0, 0);
        let (_h1, mut rx1) = hub.subscribe(1, 1);

        hub.publish(0, 0, delta(1));

        assert_eq!(rx0.recv().await.unwrap().seq, 1);
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_removes_room_when_empty() {
        let hub = SubscriptionHub::default();
        let (handle, _rx) = hub.subscribe(5, 5);
        assert_eq!(hub.room_count(), 1);

        hub.unsubscribe(&handle);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn room_survives_while_any_subscriber_remains() {
        let hub = SubscriptionHub::default();
        let (h0, _rx0) = hub.subscribe(2, 2);
        let (h1, _rx1) = hub.subscribe(2, 2);

        hub.unsubscribe(&h0);
        assert_eq!(hub.room_count(), 1);
        assert_eq!(hub.subscriber_count(2, 2), 1);

        hub.unsubscribe(&h1);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn full_outbox_tears_down_only_that_subscriber() {
        let hub = SubscriptionHub::new(1);
        let (_slow_handle, mut slow_rx) = hub.subscribe(0, 0);
        let (_fast_handle, mut fast_rx) = hub.subscribe(0, 0);

        // `fast` keeps draining; `slow` never does, so its single-slot
        // outbox is still full by the time the next delta arrives.
        hub.publish(0, 0, delta(1));
        assert_eq!(fast_rx.recv().await.unwrap().seq, 1);

        hub.publish(0, 0, delta(2)); // slow's outbox (still holding delta 1) overflows here
        assert_eq!(hub.subscriber_count(0, 0), 1);

        // The surviving subscriber is unaffected going forward.
        assert_eq!(fast_rx.recv().await.unwrap().seq, 2);
        hub.publish(0, 0, delta(3));
        assert_eq!(fast_rx.recv().await.unwrap().seq, 3);

        // The torn-down subscriber still drains what was already queued
        // before its sender was dropped, then sees the channel close.
        assert_eq!(slow_rx.recv().await.unwrap().seq, 1);
        assert!(slow_rx.recv().await.is_none());
    }
}
