use thiserror::Error;

/// Failure of the durable tier. Absorbed by `DataStore`, surfaced only by
/// adapters and their constructors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("A data store with cache key '{0}' is already registered")]
    DuplicateKey(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
