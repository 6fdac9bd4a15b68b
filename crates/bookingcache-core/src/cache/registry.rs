//! One `DataStore` per cache key, owned by the application's composition root.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info};

use super::store::{Cacheable, DataStore};
use super::{CacheError, Fetcher, StorageAdapter};
use crate::config::DataStoreConfig;

/// Type-erased handle used to clear every registered store at once.
#[async_trait]
trait RegisteredStore: Send + Sync {
    async fn clear(&self);
}

#[async_trait]
impl<T: Cacheable> RegisteredStore for DataStore<T> {
    async fn clear(&self) {
        DataStore::clear(self).await;
    }
}

/// Creates data stores and guarantees their cache keys are unique.
///
/// Built once at startup; screens receive the `DataStore` handles it returns.
/// When constructed with a storage adapter, every store it creates is backed
/// by that durable tier.
#[derive(Default)]
pub struct StoreRegistry {
    storage: Option<Arc<dyn StorageAdapter>>,
    stores: Mutex<BTreeMap<String, Arc<dyn RegisteredStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage: Some(storage),
            stores: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create the store for `key`. Fails if the key is already taken.
    pub fn register<T: Cacheable>(
        &self,
        key: impl Into<String>,
        fetcher: impl Fetcher<T> + 'static,
        config: DataStoreConfig,
    ) -> Result<DataStore<T>, CacheError> {
        let key = key.into();
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        if stores.contains_key(&key) {
            return Err(CacheError::DuplicateKey(key));
        }

        let store = DataStore::build(key.clone(), Box::new(fetcher), config, self.storage.clone());
        stores.insert(key.clone(), Arc::new(store.clone()));
        debug!(key = %key, persistent = self.storage.is_some(), "Registered data store");
        Ok(store)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Clear every store in memory and in durable storage (e.g. on logout)
    pub async fn clear_all(&self) {
        let stores: Vec<Arc<dyn RegisteredStore>> = self
            .stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        info!(count = stores.len(), "Clearing all data stores");
        join_all(stores.iter().map(|store| store.clear())).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
