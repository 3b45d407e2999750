//! In-memory record store for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::BlobStore;
use gdir_common::{validate_store_key, Error, Result};

/// In-memory record store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryStore {
    storage: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.storage
            .read()
            .map_err(|_| Error::Io(std::io::Error::other("memory store lock poisoned")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.storage
            .write()
            .map_err(|_| Error::Io(std::io::Error::other("memory store lock poisoned")))
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        validate_store_key(key)?;
        self.write()?.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_store_key(key)?;
        Ok(self.read()?.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_store_key(key)?;
        Ok(self.read()?.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_store_key(key)?;
        Ok(self.write()?.remove(key).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryStore::new();
        let data = b"Hello, World!".to_vec();

        store.put("test", data.clone()).await.unwrap();
        assert_eq!(store.get("test").await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let store = MemoryStore::new();

        assert!(!store.exists("k").await.unwrap());
        store.put("k", vec![1, 2, 3]).await.unwrap();
        assert!(store.exists("k").await.unwrap());

        assert!(store.delete("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = MemoryStore::new();

        store.put("2", vec![2]).await.unwrap();
        store.put("0", vec![0]).await.unwrap();
        store.put("1", vec![1]).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.put("shared", vec![9]).await.unwrap();
        assert_eq!(other.get("shared").await.unwrap(), Some(vec![9]));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.put("a/b", vec![]).await,
            Err(Error::InputValidation(_))
        ));
    }
}
