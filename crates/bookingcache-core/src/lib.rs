//! Client-side data cache for the booking apps.
//!
//! - `cache`: TTL-aware, coalescing `DataStore`s with an optional durable tier
//! - `request`: the request pipeline and its extensions
//! - `api`: the response envelope, error taxonomy and an HTTP fetcher
//! - `config`: store and application configuration

pub mod api;
pub mod cache;
pub mod config;
pub mod request;

pub use api::{ApiError, ApiResponse};
pub use cache::{
    fetcher_fn, CacheError, DataStore, FileStorage, Fetcher, GetOptions, MemoryStorage,
    StorageAdapter, StoreRegistry, StoreState,
};
pub use config::{AppConfig, DataStoreConfig};
pub use request::{compose_request, ActionGuard};
