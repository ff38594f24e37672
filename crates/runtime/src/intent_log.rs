use std::collections::VecDeque;

use foundation::time::Millis;

/// One recorded entry, stamped with the time it was emitted and a sequence
/// number that keeps increasing even after old entries are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Logged<T> {
    pub seq: u64,
    pub at: Millis,
    pub item: T,
}

/// Bounded, ordered trace of emitted items for debug views and tests.
///
/// When full, the oldest entry is dropped.
#[derive(Debug, Clone)]
pub struct IntentLog<T> {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<Logged<T>>,
}

impl<T> IntentLog<T> {
    /// `capacity` bounds the log; storage grows with use, not up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, at: Millis, item: T) -> u64 {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(Logged { seq, at, item });
        seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of items ever recorded.
    pub fn total_recorded(&self) -> u64 {
        self.next_seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &Logged<T>> + '_ {
        self.entries.iter()
    }

    pub fn drain(&mut self) -> Vec<Logged<T>> {
        self.entries.drain(..).collect()
    }
}
