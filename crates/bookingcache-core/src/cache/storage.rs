//! Durable key-value adapters for the persistent cache tier.
//!
//! Values travel as `serde_json::Value` so adapters stay object-safe and a
//! single adapter can back stores of different payload types.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::StorageError;

/// Async durable storage. Keys arrive already namespaced by the store.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// One pretty-printed JSON file per key under a cache directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }

    /// Remove every record whose key starts with `prefix`, leaving any other
    /// file in the directory alone. Returns the number of records removed.
    pub async fn clear_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(key) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
                .and_then(decode_key)
            else {
                continue;
            };
            if !key.starts_with(prefix) || !entry.file_type().await?.is_file() {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(dir = %self.dir.display(), prefix, removed, "Cleared cache files");
        Ok(removed)
    }
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.')
}

/// File-name-safe form of a key. Other bytes become `%XX`, so distinct
/// keys always map to distinct files.
fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if is_plain(byte) {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name
}

/// Inverse of `encode_key`; `None` for names it could not have produced
fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut key = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                key.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte if is_plain(byte) => {
                key.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(key).ok()
}

/// Distinguishes temp files of concurrent writes to the same key
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.file_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.file_path(key);
        let contents = serde_json::to_string_pretty(&value)?;

        // Write then rename so a crash never leaves a half-written record
        let tmp = path.with_extension(format!(
            "json.{}-{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "Wrote cache file");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(storage.get("cached_data_profile").await.unwrap().is_none());

        storage.set("cached_data_profile", json!({"name": "Ann"})).await.unwrap();
        assert_eq!(
            storage.get("cached_data_profile").await.unwrap(),
            Some(json!({"name": "Ann"}))
        );
        assert_eq!(storage.len(), 1);

        storage.remove("cached_data_profile").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("cache")).unwrap();

        assert!(storage.get("cached_data_services").await.unwrap().is_none());

        storage
            .set("cached_data_services", json!(["cut", "color"]))
            .await
            .unwrap();
        assert_eq!(
            storage.get("cached_data_services").await.unwrap(),
            Some(json!(["cut", "color"]))
        );
        assert!(storage.dir().join("cached_data_services.json").exists());

        storage.remove("cached_data_services").await.unwrap();
        assert!(storage.get("cached_data_services").await.unwrap().is_none());

        // Removing a missing key is not an error
        storage.remove("cached_data_services").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        storage.set("cached_data_stylist/42", json!(1)).await.unwrap();
        storage.set("cached_data_stylist_42", json!(2)).await.unwrap();
        assert!(dir.path().join("cached_data_stylist%2F42.json").exists());
        assert_eq!(storage.get("cached_data_stylist/42").await.unwrap(), Some(json!(1)));
        assert_eq!(storage.get("cached_data_stylist_42").await.unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_key_encoding_is_reversible() {
        for key in ["cached_data_home", "a/b", "a_b", "50%", "café ?x=1"] {
            assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        }
        assert_ne!(encode_key("a/b"), encode_key("a_b"));
        assert_eq!(decode_key("bad%zz"), None);
        assert_eq!(decode_key("has space"), None);
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = std::sync::Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());

        let writes = (0..8).map(|n| {
            let storage = storage.clone();
            tokio::spawn(async move { storage.set("cached_data_home", json!(n)).await })
        });
        for write in futures::future::join_all(writes).await {
            write.unwrap().unwrap();
        }

        let value = storage.get("cached_data_home").await.unwrap().unwrap();
        assert!(value.as_i64().is_some_and(|n| (0..8).contains(&n)));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_clear_prefix_leaves_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        storage.set("cached_data_profile", json!(1)).await.unwrap();
        storage.set("cached_data_stylist/42", json!(2)).await.unwrap();
        storage.set("settings", json!(3)).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        std::fs::write(dir.path().join("cached_data_x.json.bak"), "keep me").unwrap();
        std::fs::create_dir(dir.path().join("cached_data_dir.json")).unwrap();

        assert_eq!(storage.clear_prefix("cached_data_").await.unwrap(), 2);

        assert!(storage.get("cached_data_profile").await.unwrap().is_none());
        assert!(storage.get("cached_data_stylist/42").await.unwrap().is_none());
        assert_eq!(storage.get("settings").await.unwrap(), Some(json!(3)));
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("cached_data_x.json.bak").exists());
        assert!(dir.path().join("cached_data_dir.json").is_dir());
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.path().join("cached_data_home.json"), "{not json").unwrap();

        let result = storage.get("cached_data_home").await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
