//! Client-side data cache.
//!
//! This module provides the `DataStore` for serving remote data to screens
//! with TTL expiry, single-flight fetching, and graceful fallback to stale
//! data, plus the durable tier that lets cached values survive restarts.
//!
//! - `DataStore`: one cached value per cache key
//! - `StoreRegistry`: creates stores and guards key uniqueness
//! - `StorageAdapter`: durable key-value tier (`MemoryStorage`, `FileStorage`)
//! - `Observable` / `Subscription`: replay-last-value push channel

mod broadcast;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod storage;
pub mod store;

pub use broadcast::{Observable, Subscription};
pub use entry::CachedData;
pub use error::{CacheError, StorageError};
pub use fetcher::{fetcher_fn, Fetcher, FnFetcher};
pub use registry::StoreRegistry;
pub use storage::{FileStorage, MemoryStorage, StorageAdapter};
pub use store::{Cacheable, DataStore, GetOptions, StoreState, STORAGE_KEY_PREFIX};
