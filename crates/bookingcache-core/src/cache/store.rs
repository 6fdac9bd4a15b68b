//! The keyed, TTL-aware, coalescing data store.
//!
//! A `DataStore` is the single place a screen goes for one piece of remote
//! data (the client profile, the stylist's services, today's appointments).
//! It supports both pull (`get`) and push (`as_observable` / `subscribe`)
//! consumption:
//!
//! - a `get` inside the TTL window answers from memory without fetching;
//! - concurrent `get`s share one outstanding fetch;
//! - a failed fetch keeps the last good response and adds the error;
//! - `set` stores a locally known value (e.g. after a profile edit) without
//!   refetching;
//! - with a `StorageAdapter`, values survive restarts under
//!   `cached_data_<key>` and serve as a fallback when offline.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::broadcast::{Broadcast, Observable, Subscription};
use super::entry::{CacheEntry, CachedData};
use super::{Fetcher, StorageAdapter};
use crate::api::{ApiError, ApiResponse};
use crate::config::DataStoreConfig;

/// Prefix of the durable storage key for every store
pub const STORAGE_KEY_PREFIX: &str = "cached_data_";

/// Payload types a `DataStore` can hold
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Bypass the TTL check and the durable tier
    pub refresh: bool,
}

impl GetOptions {
    pub fn refresh() -> Self {
        Self { refresh: true }
    }

    pub fn cached() -> Self {
        Self { refresh: false }
    }
}

/// Where a store currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Empty,
    Fetching,
    Fresh,
    Stale,
}

struct Inner<T> {
    key: String,
    storage_key: String,
    fetcher: Box<dyn Fetcher<T>>,
    config: DataStoreConfig,
    storage: Option<Arc<dyn StorageAdapter>>,
    entry: Mutex<CacheEntry<T>>,
    /// Entry version of the last durable write or removal
    persisted: tokio::sync::Mutex<u64>,
    channel: Arc<Broadcast<Option<ApiResponse<T>>>>,
}

/// Cheap to clone; clones share the same cache entry.
pub struct DataStore<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DataStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for DataStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("key", &self.inner.key)
            .field("config", &self.inner.config)
            .field("persistent", &self.inner.storage.is_some())
            .finish()
    }
}

impl<T: Cacheable> DataStore<T> {
    /// In-memory store. Cache keys must be unique across the app; use
    /// `StoreRegistry` to have that checked.
    pub fn new(key: impl Into<String>, fetcher: impl Fetcher<T> + 'static, config: DataStoreConfig) -> Self {
        Self::build(key.into(), Box::new(fetcher), config, None)
    }

    /// Store backed by a durable tier
    pub fn persistent(
        key: impl Into<String>,
        fetcher: impl Fetcher<T> + 'static,
        config: DataStoreConfig,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        Self::build(key.into(), Box::new(fetcher), config, Some(storage))
    }

    pub(crate) fn build(
        key: String,
        fetcher: Box<dyn Fetcher<T>>,
        config: DataStoreConfig,
        storage: Option<Arc<dyn StorageAdapter>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage_key: format!("{}{}", STORAGE_KEY_PREFIX, key),
                key,
                fetcher,
                config,
                storage,
                entry: Mutex::new(CacheEntry::new()),
                persisted: tokio::sync::Mutex::new(0),
                channel: Arc::new(Broadcast::new(None)),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Get the data, fetching it only if needed.
    ///
    /// Answers from memory when a response is cached within the TTL and
    /// `options.refresh` is false. Otherwise joins the outstanding fetch, or
    /// starts one. A failed fetch resolves with the previous good response
    /// (if any) alongside the new error; it never resolves with an error
    /// alone while good data is cached.
    pub async fn get(&self, options: GetOptions) -> ApiResponse<T> {
        let fetch = {
            let mut entry = self.inner.lock_entry();

            if !options.refresh {
                if let Some(value) = entry.fresh_value(self.inner.config.cache_ttl, Instant::now()) {
                    debug!(key = %self.inner.key, "Cache hit");
                    return value;
                }
            }

            match entry.in_flight() {
                Some(fetch) => {
                    debug!(key = %self.inner.key, "Joining in-flight fetch");
                    fetch
                }
                None => {
                    let id = entry.next_fetch_id();
                    let hydrate = !options.refresh && entry.value.is_none();
                    debug!(key = %self.inner.key, id, hydrate, "Starting fetch");
                    let task = Inner::run_fetch(Arc::clone(&self.inner), id, hydrate).boxed();
                    entry.start_fetch(id, task)
                }
            }
        };

        fetch.await
    }

    /// Shorthand for `get(GetOptions::refresh())`
    pub async fn refresh(&self) -> ApiResponse<T> {
        self.get(GetOptions::refresh()).await
    }

    /// Replace the cached value with `value` and notify subscribers.
    ///
    /// The in-memory update and notifications happen before this returns.
    /// The returned future writes the value through to durable storage; it
    /// can be awaited, or dropped when persistence is not wanted.
    pub fn set(&self, value: T) -> impl Future<Output = ()> + Send + 'static {
        let (snapshot, version) = {
            let mut entry = self.inner.lock_entry();
            entry.set(value.clone(), Instant::now())
        };
        debug!(key = %self.inner.key, version, "Value set directly");
        self.inner.channel.publish(version, Some(snapshot));

        let inner = Arc::clone(&self.inner);
        async move {
            inner.write_durable(&value, version).await;
        }
    }

    /// Snapshot of the current value, `None` before anything was fetched or set
    pub fn value(&self) -> Option<ApiResponse<T>> {
        self.inner.lock_entry().value.clone()
    }

    /// Push view of the store. New subscribers receive the current value first.
    pub fn as_observable(&self) -> Observable<Option<ApiResponse<T>>> {
        Observable::new(Arc::clone(&self.inner.channel))
    }

    /// Call `callback` with the current value now and with every later update
    pub fn subscribe(
        &self,
        callback: impl Fn(&Option<ApiResponse<T>>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.channel.subscribe(callback)
    }

    pub fn state(&self) -> StoreState {
        let entry = self.inner.lock_entry();
        if entry.is_fetching() {
            StoreState::Fetching
        } else if entry.value.is_none() {
            StoreState::Empty
        } else if entry.is_stale(self.inner.config.cache_ttl, Instant::now()) {
            StoreState::Stale
        } else {
            StoreState::Fresh
        }
    }

    /// Time since the response was last refreshed
    pub fn cached_age(&self) -> Option<Duration> {
        self.inner
            .lock_entry()
            .fetched_at
            .map(|at| Instant::now().saturating_duration_since(at))
    }

    /// Forget the cached value in memory and in durable storage (logout).
    /// An outstanding fetch is discarded when it completes.
    pub async fn clear(&self) {
        let version = self.inner.lock_entry().reset();
        debug!(key = %self.inner.key, "Store cleared");
        self.inner.channel.publish(version, None);

        if let Some(storage) = &self.inner.storage {
            let mut persisted = self.inner.persisted.lock().await;
            if version > *persisted {
                *persisted = version;
                if let Err(e) = storage.remove(&self.inner.storage_key).await {
                    warn!(key = %self.inner.key, error = %e, "Failed to remove durable cache");
                }
            }
        }
    }
}

impl<T: Cacheable> Inner<T> {
    fn lock_entry(&self) -> MutexGuard<'_, CacheEntry<T>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Body of one shared fetch. Runs at most once per fetch id no matter
    /// how many callers await it.
    async fn run_fetch(self: Arc<Self>, id: u64, hydrate: bool) -> ApiResponse<T> {
        let mut durable = None;

        if hydrate {
            durable = self.read_durable().await;
            if let Some(record) = &durable {
                if !record.is_expired(self.config.cache_ttl) {
                    debug!(key = %self.key, age = %record.age_display(), "Hydrated from durable cache");
                    return self.commit_hydrated(id, record);
                }
            }
        }

        let result = match AssertUnwindSafe(self.fetcher.fetch()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ApiError::Unknown(format!(
                "fetcher panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match result {
            Ok(response) => {
                let (value, committed) = self.commit_success(id, response);
                if let (Some(version), Some(response)) = (committed, &value.response) {
                    self.write_durable(response, version).await;
                }
                value
            }
            Err(error) => {
                debug!(key = %self.key, error = %error, "Fetch failed");
                let has_response = self.lock_entry().has_response();
                let fallback = if has_response {
                    None
                } else {
                    if !hydrate {
                        durable = self.read_durable().await;
                    }
                    durable.map(|record| record.data)
                };
                self.commit_failure(id, error, fallback)
            }
        }
    }

    fn commit_hydrated(&self, id: u64, record: &CachedData<T>) -> ApiResponse<T> {
        let now = Instant::now();
        let fetched_at = now.checked_sub(record.age()).unwrap_or(now);
        self.commit_success_at(id, record.data.clone(), fetched_at).0
    }

    /// Returns the committed value and its entry version, or the store's
    /// current value and `None` when the fetch was superseded
    fn commit_success(&self, id: u64, response: T) -> (ApiResponse<T>, Option<u64>) {
        self.commit_success_at(id, response, Instant::now())
    }

    fn commit_success_at(&self, id: u64, response: T, at: Instant) -> (ApiResponse<T>, Option<u64>) {
        let committed = {
            let mut entry = self.lock_entry();
            match entry.commit_success(id, response.clone(), at) {
                Some(committed) => committed,
                None => return (self.superseded(&entry, id, ApiResponse::ok(response)), None),
            }
        };
        let (value, version) = committed;
        self.channel.publish(version, Some(value.clone()));
        (value, Some(version))
    }

    fn commit_failure(&self, id: u64, error: ApiError, fallback: Option<T>) -> ApiResponse<T> {
        let committed = {
            let mut entry = self.lock_entry();
            match entry.commit_failure(id, error.clone(), fallback.clone()) {
                Some(committed) => committed,
                None => {
                    let outcome = ApiResponse::with_fallback(error, fallback);
                    return self.superseded(&entry, id, outcome);
                }
            }
        };
        let (value, version) = committed;
        self.channel.publish(version, Some(value.clone()));
        value
    }

    /// A newer `set` or `clear` replaced the fetch we were running. Its
    /// callers get the entry's current value rather than the late result.
    fn superseded(&self, entry: &CacheEntry<T>, id: u64, outcome: ApiResponse<T>) -> ApiResponse<T> {
        warn!(key = %self.key, id, "Discarding result of superseded fetch");
        entry.value.clone().unwrap_or(outcome)
    }

    async fn read_durable(&self) -> Option<CachedData<T>> {
        let storage = self.storage.as_ref()?;

        let raw = match storage.get(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read durable cache");
                return None;
            }
        };

        match serde_json::from_value::<CachedData<T>>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable durable cache entry");
                if let Err(e) = storage.remove(&self.storage_key).await {
                    warn!(key = %self.key, error = %e, "Failed to remove durable cache");
                }
                None
            }
        }
    }

    /// Persist `data` committed at entry `version`. Writes are serialized and
    /// a value older than what is already on disk is never written.
    async fn write_durable(&self, data: &T, version: u64) {
        let Some(storage) = &self.storage else {
            return;
        };

        let mut persisted = self.persisted.lock().await;
        if version <= *persisted {
            debug!(key = %self.key, version, "Skipping durable write of superseded value");
            return;
        }
        *persisted = version;

        let raw = match serde_json::to_value(CachedData::new(data)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to serialize value for durable cache");
                return;
            }
        };

        if let Err(e) = storage.set(&self.storage_key, raw).await {
            warn!(key = %self.key, error = %e, "Failed to write durable cache");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
