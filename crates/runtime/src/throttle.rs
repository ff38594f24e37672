use foundation::time::Millis;

/// Collapse-to-latest throttle.
///
/// At most one item is released per `interval_ms`. Items offered while the
/// window is closed replace each other; only the most recent survives and is
/// released by [`Throttle::poll`] once the window reopens (trailing edge).
///
/// Time is passed in explicitly, so behavior is a pure function of the
/// `(offer, poll)` call sequence and its timestamps.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval_ms: u64,
    last_release: Option<Millis>,
    pending: Option<T>,
    collapsed: u64,
}

impl<T> Throttle<T> {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_release: None,
            pending: None,
            collapsed: 0,
        }
    }

    /// Whether an item offered at `now` would be released immediately.
    pub fn is_open(&self, now: Millis) -> bool {
        match self.last_release {
            None => true,
            Some(t) => now.saturating_since(t) >= self.interval_ms,
        }
    }

    /// Offers `item` at `now`.
    ///
    /// Returns the item back if the window is open (leading edge); otherwise it
    /// is parked as the pending item and `None` is returned.
    pub fn offer(&mut self, now: Millis, item: T) -> Option<T> {
        if self.is_open(now) {
            if self.pending.take().is_some() {
                self.collapsed += 1;
            }
            self.last_release = Some(now);
            return Some(item);
        }

        if self.pending.replace(item).is_some() {
            self.collapsed += 1;
        }
        None
    }

    /// Releases the pending item if the window has reopened by `now`.
    pub fn poll(&mut self, now: Millis) -> Option<T> {
        if self.pending.is_none() || !self.is_open(now) {
            return None;
        }
        self.last_release = Some(now);
        self.pending.take()
    }

    /// Drops the pending item without releasing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Earliest time at which [`Throttle::poll`] can release the pending item.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.pending.as_ref()?;
        Some(match self.last_release {
            None => Millis(0),
            Some(t) => t.add(self.interval_ms),
        })
    }

    /// Number of items superseded by a newer one before release.
    pub fn collapsed_count(&self) -> u64 {
        self.collapsed
    }
}
