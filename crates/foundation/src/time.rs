//! Millisecond timebase and injectable clocks.
//!
//! Input handling is driven by explicit timestamps so throttling can be
//! replayed deterministically; the [`Clock`] trait only backs the periodic
//! `tick` that flushes collapsed samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Milliseconds on a monotonic, session-relative timeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Millis(pub u64);

impl Millis {
    /// Elapsed milliseconds since `earlier`; zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Millis) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn add(self, ms: u64) -> Self {
        Millis(self.0.saturating_add(ms))
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Millis {
        let ms = self.origin.elapsed().as_millis();
        Millis(u64::try_from(ms).unwrap_or(u64::MAX))
    }
}

/// Hand-driven clock for tests and trace replay. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start.0)),
        }
    }

    pub fn set(&self, t: Millis) {
        self.now_ms.store(t.0, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> Millis {
        Millis(self.now_ms.fetch_add(ms, Ordering::SeqCst).saturating_add(ms))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.now_ms.load(Ordering::SeqCst))
    }
}
