//! Wall-clock access for the store and guard, injectable for deterministic
//! tests. Grounded in the teacher's `AtomicTime`: a shared clock handle
//! rather than scattering `SystemTime::now()` calls through the hot path.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

enum ClockInner {
    System,
    Fixed(AtomicI64),
}

impl Clock {
    /// A clock backed by the real wall clock.
    pub fn system() -> Self {
        Self {
            inner: Arc::new(ClockInner::System),
        }
    }

    /// A clock that always reports `secs` until [`Clock::set`] is called.
    /// Used by tests that need deterministic cooldown/speed-clamp math.
    pub fn fixed(secs: i64) -> Self {
        Self {
            inner: Arc::new(ClockInner::Fixed(AtomicI64::new(secs))),
        }
    }

    pub fn now_unix_secs(&self) -> i64 {
        match &*self.inner {
            ClockInner::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64,
            ClockInner::Fixed(v) => v.load(Ordering::Relaxed),
        }
    }

    /// Advances a fixed clock by `delta` seconds. No-op on a system clock.
    pub fn advance(&self, delta: i64) {
        if let ClockInner::Fixed(v) = &*self.inner {
            v.fetch_add(delta, Ordering::Relaxed);
        }
    }
}
