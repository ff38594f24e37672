use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::ids::EntityKey;
use futures_util::FutureExt;
pub use futures_util::future::BoxFuture;

use crate::descriptor::Descriptor;
use crate::error::FetchError;

/// Source of entity reference data (a remote directory service, a fixture
/// table, ...).
///
/// The returned future must not borrow the provider so the cache can run it
/// as a detached task. Timeouts are the provider's concern.
pub trait DataProvider: Send + Sync {
    fn fetch(&self, key: EntityKey) -> BoxFuture<'static, Result<Descriptor, FetchError>>;
}

impl<P: DataProvider + ?Sized> DataProvider for Arc<P> {
    fn fetch(&self, key: EntityKey) -> BoxFuture<'static, Result<Descriptor, FetchError>> {
        (**self).fetch(key)
    }
}

/// In-memory provider backed by a fixed descriptor table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: Arc<BTreeMap<EntityKey, Descriptor>>,
}

impl StaticDirectory {
    pub fn new(descriptors: impl IntoIterator<Item = Descriptor>) -> Self {
        let entries = descriptors
            .into_iter()
            .map(|d| (d.key.clone(), d))
            .collect::<BTreeMap<_, _>>();
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Loads a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self, FetchError> {
        let descriptors: Vec<Descriptor> = serde_json::from_str(json)?;
        Ok(Self::new(descriptors))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DataProvider for StaticDirectory {
    fn fetch(&self, key: EntityKey) -> BoxFuture<'static, Result<Descriptor, FetchError>> {
        let result = self
            .entries
            .get(&key)
            .cloned()
            .ok_or(FetchError::NotFound { key });
        futures_util::future::ready(result).boxed()
    }
}
