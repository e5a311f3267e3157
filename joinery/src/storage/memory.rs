use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, BlobStore};
use crate::error::Result;

/// Blob store keeping bytes in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(self.backend(), key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn store_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        validate_key(self.backend(), key)?;
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(self.backend(), key)?;
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_load_delete() {
        let store = InMemoryBlobStore::new();
        assert_eq!(store.load_bytes("datasets/a.arrow").await.unwrap(), None);

        store
            .store_bytes("datasets/a.arrow", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(
            store.load_bytes("datasets/a.arrow").await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(store.keys().await, vec!["datasets/a.arrow"]);

        store.delete("datasets/a.arrow").await.unwrap();
        store.delete("datasets/a.arrow").await.unwrap();
        assert_eq!(store.load_bytes("datasets/a.arrow").await.unwrap(), None);
    }
}
