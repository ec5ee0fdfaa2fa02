//! Time source for oracle updates.
//!
//! Every mutating oracle operation takes an explicit `now` in milliseconds.
//! Callers obtain it from a [`Clock`], which must be monotonic for the
//! duration of one batch of operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::TimestampMs;

/// A source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds.
    fn now_ms(&self) -> TimestampMs;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// A manually driven clock for simulations and tests.
///
/// The clock never moves backwards: [`ManualClock::set`] ignores earlier
/// timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start_ms`.
    pub fn new(start_ms: TimestampMs) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Advance the clock by `delta_ms` and return the new time.
    pub fn advance(&self, delta_ms: u64) -> TimestampMs {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Move the clock forward to `now_ms`. Earlier values are ignored.
    pub fn set(&self, now_ms: TimestampMs) {
        self.now.fetch_max(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> TimestampMs {
        self.now.load(Ordering::SeqCst)
    }
}
