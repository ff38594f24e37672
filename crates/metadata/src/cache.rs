use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use foundation::ids::EntityKey;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::descriptor::Descriptor;
use crate::error::FetchError;
use crate::provider::DataProvider;

pub type FetchOutcome = Result<Arc<Descriptor>, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Identifies one fetch operation; a retried key gets a fresh id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `get` calls answered from a resolved entry.
    pub hits: u64,
    /// `get` calls that had to start a fetch.
    pub misses: u64,
    /// `get` calls that attached to an outstanding fetch.
    pub coalesced: u64,
    pub fetches_started: u64,
    pub failures: u64,
}

/// Handle to an outstanding fetch. Every handle for the same operation
/// completes with the same outcome.
#[derive(Clone)]
pub struct PendingFetch {
    key: EntityKey,
    id: FetchId,
    shared: SharedFetch,
}

impl PendingFetch {
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn id(&self) -> FetchId {
        self.id
    }

    pub fn outcome(self) -> impl Future<Output = FetchOutcome> + Send + 'static {
        self.shared
    }
}

impl std::fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Debug)]
pub enum Lookup {
    Resolved(Arc<Descriptor>),
    Pending(PendingFetch),
}

enum Slot {
    Pending { id: FetchId, shared: SharedFetch },
    Resolved(Arc<Descriptor>),
    Failed { id: FetchId, error: FetchError },
}

impl Slot {
    fn status(&self) -> EntryStatus {
        match self {
            Slot::Pending { .. } => EntryStatus::Pending,
            Slot::Resolved(_) => EntryStatus::Resolved,
            Slot::Failed { .. } => EntryStatus::Failed,
        }
    }
}

#[derive(Default)]
struct Table {
    entries: BTreeMap<EntityKey, Slot>,
    next_fetch: u64,
    stats: CacheStats,
}

impl Table {
    /// Records the outcome of fetch `id`, unless the key was invalidated or
    /// refetched in the meantime.
    fn settle(&mut self, key: &EntityKey, id: FetchId, outcome: &FetchOutcome) {
        let Some(slot) = self.entries.get_mut(key) else {
            trace!(%key, fetch = id.0, "fetch settled after invalidation");
            return;
        };
        if !matches!(slot, Slot::Pending { id: current, .. } if *current == id) {
            trace!(%key, fetch = id.0, "fetch settled for a superseded operation");
            return;
        }
        *slot = match outcome {
            Ok(descriptor) => Slot::Resolved(Arc::clone(descriptor)),
            Err(error) => {
                self.stats.failures += 1;
                warn!(%key, %error, "metadata fetch failed");
                Slot::Failed {
                    id,
                    error: error.clone(),
                }
            }
        };
    }
}

/// Session-lifetime memo of entity descriptors with single-flight fetching.
///
/// - One entry per key: `Pending`, `Resolved` or `Failed`.
/// - A `get` on a pending key attaches to the outstanding operation instead of
///   starting another one.
/// - `Failed` entries are not sticky: the next `get` retries from scratch.
/// - No expiry; entries live until [`MetadataCache::invalidate`].
///
/// `get` never awaits. The table lock is held only for lookups and
/// registration; [`DataProvider::fetch`] is called with the lock released,
/// so a provider may use the cache. The fetch itself is spawned onto the
/// ambient tokio runtime when there is one; without a runtime it runs when a
/// waiter first polls it.
///
/// Clones share the same table.
#[derive(Clone)]
pub struct MetadataCache {
    provider: Arc<dyn DataProvider>,
    table: Arc<Mutex<Table>>,
}

impl MetadataCache {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self {
            provider,
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    pub fn get(&self, key: &EntityKey) -> Lookup {
        let mut table = self.table.lock();

        match table.entries.get(key) {
            Some(Slot::Resolved(descriptor)) => {
                let descriptor = Arc::clone(descriptor);
                table.stats.hits += 1;
                return Lookup::Resolved(descriptor);
            }
            Some(Slot::Pending { id, shared }) => {
                let pending = PendingFetch {
                    key: key.clone(),
                    id: *id,
                    shared: shared.clone(),
                };
                table.stats.coalesced += 1;
                return Lookup::Pending(pending);
            }
            Some(Slot::Failed { id, .. }) => {
                debug!(%key, previous = id.0, "retrying failed fetch");
            }
            None => {}
        }

        let id = FetchId(table.next_fetch);
        table.next_fetch += 1;
        drop(table);

        // The provider runs outside the lock so it may call back into the cache.
        let shared = self.start_fetch(key.clone(), id);

        let mut table = self.table.lock();
        // Another caller may have registered the key while the lock was
        // released; its entry wins and ours is dropped unpolled.
        match table.entries.get(key) {
            Some(Slot::Pending { id, shared }) => {
                let pending = PendingFetch {
                    key: key.clone(),
                    id: *id,
                    shared: shared.clone(),
                };
                table.stats.coalesced += 1;
                return Lookup::Pending(pending);
            }
            Some(Slot::Resolved(descriptor)) => {
                let descriptor = Arc::clone(descriptor);
                table.stats.hits += 1;
                return Lookup::Resolved(descriptor);
            }
            Some(Slot::Failed { .. }) | None => {}
        }
        table.stats.misses += 1;
        table.stats.fetches_started += 1;
        table.entries.insert(
            key.clone(),
            Slot::Pending {
                id,
                shared: shared.clone(),
            },
        );
        drop(table);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let _ = handle.spawn(shared.clone());
        }

        debug!(%key, fetch = id.0, "metadata fetch started");
        Lookup::Pending(PendingFetch {
            key: key.clone(),
            id,
            shared,
        })
    }

    fn start_fetch(&self, key: EntityKey, id: FetchId) -> SharedFetch {
        let request = self.provider.fetch(key.clone());
        let table: Weak<Mutex<Table>> = Arc::downgrade(&self.table);
        async move {
            let outcome = request.await.map(Arc::new);
            if let Some(table) = table.upgrade() {
                table.lock().settle(&key, id, &outcome);
            }
            outcome
        }
        .boxed()
        .shared()
    }

    /// Returns the resolved descriptor for `key` without starting a fetch.
    pub fn peek(&self, key: &EntityKey) -> Option<Arc<Descriptor>> {
        match self.table.lock().entries.get(key) {
            Some(Slot::Resolved(descriptor)) => Some(Arc::clone(descriptor)),
            _ => None,
        }
    }

    pub fn status(&self, key: &EntityKey) -> Option<EntryStatus> {
        self.table.lock().entries.get(key).map(Slot::status)
    }

    /// The error recorded by the last failed fetch of `key`, if that is the
    /// entry's current state.
    pub fn last_error(&self, key: &EntityKey) -> Option<FetchError> {
        match self.table.lock().entries.get(key) {
            Some(Slot::Failed { error, .. }) => Some(error.clone()),
            _ => None,
        }
    }

    /// Drops any resolved, failed or in-flight state for `key`.
    ///
    /// An in-flight fetch keeps running for its existing waiters, but its
    /// outcome is no longer recorded.
    pub fn invalidate(&self, key: &EntityKey) -> bool {
        let removed = self.table.lock().entries.remove(key).is_some();
        if removed {
            debug!(%key, "cache entry invalidated");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.table.lock().stats
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("MetadataCache")
            .field("entries", &table.entries.len())
            .field("stats", &table.stats)
            .finish()
    }
}
